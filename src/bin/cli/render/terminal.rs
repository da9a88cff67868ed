use chrono::{DateTime, Utc};

use memoru_lib::flashcards::algorithm::format_interval;
use memoru_lib::flashcards::{Card, CardPhase, ReviewSnapshot};

/// ANSI color codes
pub struct Color;

impl Color {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
}

pub fn paint(text: &str, color: &str, use_color: bool) -> String {
    if use_color {
        format!("{}{}{}", color, text, Color::RESET)
    } else {
        text.to_string()
    }
}

pub fn phase_label(phase: CardPhase, use_color: bool) -> String {
    match phase {
        CardPhase::New => paint("new", Color::GREEN, use_color),
        CardPhase::Learning => paint("learning", Color::YELLOW, use_color),
        CardPhase::Reviewing => "reviewing".to_string(),
    }
}

pub fn format_due(due: Option<DateTime<Utc>>) -> String {
    due.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "never".to_string())
}

pub fn format_tags(tags: &[String]) -> String {
    tags.iter().map(|t| format!("#{}", t)).collect::<Vec<_>>().join(" ")
}

/// Card header: id, phase, and both sides
pub fn render_card(card: &Card, use_color: bool) -> Vec<String> {
    let mut lines = vec![
        format!(
            "{} [{}]",
            paint(&card.card_id, Color::BOLD, use_color),
            phase_label(card.schedule.phase(), use_color)
        ),
        format!("Q: {}", card.front),
        format!("A: {}", card.back),
    ];
    if let Some(deck) = &card.deck_id {
        lines.push(paint(&format!("deck: {}", deck), Color::DIM, use_color));
    }
    if !card.tags.is_empty() {
        lines.push(paint(&format_tags(&card.tags), Color::DIM, use_color));
    }
    lines
}

/// One line describing a schedule snapshot
pub fn render_snapshot(snapshot: &ReviewSnapshot) -> String {
    format!(
        "ease {:.2}, interval {}, repetitions {}, due {}",
        snapshot.ease_factor,
        format_interval(snapshot.interval),
        snapshot.repetitions,
        snapshot
            .due_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "never".to_string())
    )
}

/// Truncate to `width` characters, marking the cut with "..."
pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let kept: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}
