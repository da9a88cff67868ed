mod app;
mod commands;
mod render;

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "memoru-cli", about = "Memoru flashcard CLI", version)]
struct Cli {
    /// User whose cards to operate on
    #[arg(long, global = true, default_value = "local")]
    user: String,

    /// Config file (default: <config dir>/memoru/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Create a card
    Add {
        /// Question side
        front: String,
        /// Answer side
        back: String,
        /// Deck to file the card under
        #[arg(long)]
        deck: Option<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },

    /// Show a card with its schedule and history
    Show {
        card_id: String,
    },

    /// Change fields of a card
    Edit {
        card_id: String,
        #[arg(long)]
        front: Option<String>,
        #[arg(long)]
        back: Option<String>,
        #[arg(long)]
        deck: Option<String>,
        /// Comma-separated tags, replacing the current ones
        #[arg(long)]
        tags: Option<String>,
    },

    /// Delete a card
    Rm {
        card_id: String,
    },

    /// List cards, newest first
    Ls {
        /// Only cards in this deck
        #[arg(long)]
        deck: Option<String>,
        /// Page size (1-100)
        #[arg(long)]
        limit: Option<usize>,
        /// Cursor printed by the previous page
        #[arg(long)]
        cursor: Option<String>,
    },

    /// Cards due for review now
    Due {
        /// Page size (1-100)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Number of cards and due cards
    Count,

    /// Grade a card 0-5
    Review {
        card_id: String,
        grade: i32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let use_color = !cli.no_color && atty_check();
    let app = app::App::new(cli.config.as_deref(), &cli.user)?;

    match cli.command {
        Command::Add { front, back, deck, tags } => {
            commands::add::run(&app, front, back, deck, tags.as_deref(), &cli.format, use_color).await?;
        }
        Command::Show { card_id } => {
            commands::show::run(&app, &card_id, &cli.format, use_color).await?;
        }
        Command::Edit { card_id, front, back, deck, tags } => {
            commands::edit::run(&app, &card_id, front, back, deck, tags.as_deref(), &cli.format, use_color)
                .await?;
        }
        Command::Rm { card_id } => {
            commands::rm::run(&app, &card_id).await?;
        }
        Command::Ls { deck, limit, cursor } => {
            commands::ls::run(&app, deck.as_deref(), limit, cursor.as_deref(), &cli.format).await?;
        }
        Command::Due { limit } => {
            commands::due::run(&app, limit, &cli.format, use_color).await?;
        }
        Command::Count => {
            commands::due::run_count(&app, &cli.format).await?;
        }
        Command::Review { card_id, grade } => {
            commands::review::run(&app, &card_id, grade, &cli.format, use_color).await?;
        }
    }

    Ok(())
}

/// Check if stdout is a terminal (for color support)
fn atty_check() -> bool {
    std::io::stdout().is_terminal()
}
