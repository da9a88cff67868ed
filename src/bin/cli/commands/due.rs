use anyhow::{Context, Result};
use chrono::Utc;

use crate::app::App;
use crate::render::terminal;
use crate::OutputFormat;

pub async fn run(app: &App, limit: Option<usize>, format: &OutputFormat, use_color: bool) -> Result<()> {
    let summary = app
        .due
        .summary(&app.user_id, Utc::now(), limit)
        .await
        .context("Failed to query due cards")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Plain => {
            if summary.due_cards.is_empty() {
                match summary.next_due_date {
                    Some(date) => println!("Nothing due. Next review on {}.", date),
                    None => println!("Nothing due."),
                }
                return Ok(());
            }

            for card in &summary.due_cards {
                let overdue = if card.overdue_days > 0 {
                    terminal::paint(&format!("+{}d", card.overdue_days), terminal::Color::RED, use_color)
                } else {
                    String::new()
                };
                println!("{}  {} {}", card.card_id, terminal::truncate(&card.front, 50), overdue);
            }
            println!(
                "\n{} of {} due cards shown",
                summary.due_cards.len(),
                summary.total_due_count
            );
        }
    }

    Ok(())
}

pub async fn run_count(app: &App, format: &OutputFormat) -> Result<()> {
    let total = app
        .cards
        .card_count(&app.user_id)
        .await
        .context("Failed to read card count")?;
    let due = app
        .due
        .count(&app.user_id, Utc::now())
        .await
        .context("Failed to count due cards")?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({ "cardCount": total, "dueCount": due });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => println!("{} cards, {} due", total, due),
    }

    Ok(())
}
