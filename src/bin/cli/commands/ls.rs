use anyhow::{Context, Result};

use crate::app::App;
use crate::render::terminal;
use crate::OutputFormat;

pub async fn run(
    app: &App,
    deck: Option<&str>,
    limit: Option<usize>,
    cursor: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    let page = app
        .cards
        .list(&app.user_id, limit, cursor, deck)
        .await
        .context("Failed to list cards")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&page)?),
        OutputFormat::Plain => {
            if page.cards.is_empty() {
                println!("No cards found.");
                return Ok(());
            }

            let front_width = 40;
            let due_width = 16;

            println!("{:<36} {:<front_w$} {:<due_w$} {}",
                "Id", "Front", "Due", "Tags",
                front_w = front_width, due_w = due_width);
            println!("{} {} {} {}",
                "\u{2500}".repeat(36),
                "\u{2500}".repeat(front_width),
                "\u{2500}".repeat(due_width),
                "\u{2500}".repeat(10));

            for card in &page.cards {
                println!("{:<36} {:<front_w$} {:<due_w$} {}",
                    card.card_id,
                    terminal::truncate(&card.front, front_width),
                    terminal::format_due(card.schedule.next_review_at),
                    terminal::format_tags(&card.tags),
                    front_w = front_width, due_w = due_width);
            }

            println!("\n{} cards", page.cards.len());
            if let Some(next) = &page.next_cursor {
                println!("More: --cursor {}", next);
            }
        }
    }

    Ok(())
}
