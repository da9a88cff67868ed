use anyhow::{Context, Result};

use crate::app::{parse_tags, App};
use crate::render::terminal;
use crate::OutputFormat;

pub async fn run(
    app: &App,
    front: String,
    back: String,
    deck: Option<String>,
    tags: Option<&str>,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let card = app
        .cards
        .create(&app.user_id, front, back, deck, parse_tags(tags))
        .await
        .context("Failed to create card")?;
    app.save()?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&card)?),
        OutputFormat::Plain => {
            println!("{}", terminal::paint("Created", terminal::Color::GREEN, use_color));
            for line in terminal::render_card(&card, use_color) {
                println!("{}", line);
            }
        }
    }

    Ok(())
}
