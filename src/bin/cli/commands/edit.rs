use anyhow::{Context, Result};

use memoru_lib::flashcards::CardUpdate;

use crate::app::{parse_tags, App};
use crate::render::terminal;
use crate::OutputFormat;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    app: &App,
    card_id: &str,
    front: Option<String>,
    back: Option<String>,
    deck: Option<String>,
    tags: Option<&str>,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let update = CardUpdate {
        front,
        back,
        deck_id: deck,
        tags: parse_tags(tags),
    };
    let card = app
        .cards
        .update(&app.user_id, card_id, update)
        .await
        .with_context(|| format!("Failed to update card {}", card_id))?;
    app.save()?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&card)?),
        OutputFormat::Plain => {
            for line in terminal::render_card(&card, use_color) {
                println!("{}", line);
            }
        }
    }

    Ok(())
}
