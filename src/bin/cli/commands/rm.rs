use anyhow::{Context, Result};

use crate::app::App;

pub async fn run(app: &App, card_id: &str) -> Result<()> {
    app.cards
        .delete(&app.user_id, card_id)
        .await
        .with_context(|| format!("Failed to delete card {}", card_id))?;
    app.save()?;

    println!("Deleted {}", card_id);
    Ok(())
}
