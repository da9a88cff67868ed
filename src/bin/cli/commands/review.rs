use anyhow::{Context, Result};

use crate::app::App;
use crate::render::terminal;
use crate::OutputFormat;

pub async fn run(app: &App, card_id: &str, grade: i32, format: &OutputFormat, use_color: bool) -> Result<()> {
    let outcome = app
        .reviews
        .submit_review(&app.user_id, card_id, grade)
        .await
        .with_context(|| format!("Failed to review card {}", card_id))?;
    app.save()?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
        OutputFormat::Plain => {
            let color = if grade >= 3 { terminal::Color::GREEN } else { terminal::Color::RED };
            println!("{}", terminal::paint(&format!("Grade {}", outcome.grade), color, use_color));
            println!("before: {}", terminal::render_snapshot(&outcome.previous));
            println!("after:  {}", terminal::render_snapshot(&outcome.updated));
        }
    }

    Ok(())
}
