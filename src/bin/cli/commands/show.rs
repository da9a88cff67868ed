use anyhow::{Context, Result};

use memoru_lib::flashcards::algorithm::format_interval;

use crate::app::App;
use crate::render::terminal;
use crate::OutputFormat;

pub async fn run(app: &App, card_id: &str, format: &OutputFormat, use_color: bool) -> Result<()> {
    let card = app
        .cards
        .get(&app.user_id, card_id)
        .await
        .with_context(|| format!("Failed to load card {}", card_id))?;
    let preview = app.reviews.preview(&app.user_id, card_id).await?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "card": card,
                "preview": preview,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            for line in terminal::render_card(&card, use_color) {
                println!("{}", line);
            }
            println!();
            println!(
                "ease {:.2}  interval {}  repetitions {}  due {}",
                card.schedule.ease_factor,
                format_interval(card.schedule.interval),
                card.schedule.repetitions,
                terminal::format_due(card.schedule.next_review_at)
            );

            let grades = preview
                .iter()
                .enumerate()
                .map(|(grade, days)| format!("{}:{}", grade, format_interval(*days)))
                .collect::<Vec<_>>()
                .join("  ");
            println!("{}", terminal::paint(&format!("next: {}", grades), terminal::Color::DIM, use_color));

            if !card.review_history.is_empty() {
                println!("\nHistory ({} reviews)", card.review_history.len());
                for entry in card.review_history.iter().rev().take(10) {
                    println!(
                        "  {}  grade {}  ease {:.2} -> {:.2}  interval {} -> {}",
                        entry.reviewed_at.format("%Y-%m-%d %H:%M"),
                        entry.grade,
                        entry.ease_factor_before,
                        entry.ease_factor_after,
                        entry.interval_before,
                        entry.interval_after
                    );
                }
            }
        }
    }

    Ok(())
}
