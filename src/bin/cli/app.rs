use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use memoru_lib::config::{Backend, MemoruConfig};
use memoru_lib::flashcards::{CardStore, DueIndex, ReviewOrchestrator};
use memoru_lib::kv::{KvStore, MemoryStore};

/// Shared application state for CLI commands
pub struct App {
    pub user_id: String,
    pub cards: Arc<CardStore>,
    pub due: DueIndex,
    pub reviews: ReviewOrchestrator,
    /// Local store and the snapshot it was loaded from
    local: Option<(Arc<MemoryStore>, PathBuf)>,
}

impl App {
    pub fn new(config_path: Option<&Path>, user_id: &str) -> Result<Self> {
        let config = MemoruConfig::load(config_path).context("Failed to load configuration")?;

        let (store, local) = match config.backend {
            Backend::Local => {
                let path = config.data_file().context("Failed to resolve data file")?;
                let memory = config
                    .open_local()
                    .with_context(|| format!("Failed to open local store {}", path.display()))?;
                log::debug!("Using local store at {}", path.display());
                let store: Arc<dyn KvStore> = memory.clone();
                (store, Some((memory, path)))
            }
            Backend::Remote => {
                let remote = config.open_remote().context("Failed to open remote store")?;
                log::debug!("Using remote store at {:?}", config.endpoint);
                (remote, None)
            }
        };

        let cards = Arc::new(CardStore::new(store.clone(), config.tables.clone()));
        Ok(Self {
            user_id: user_id.to_string(),
            due: DueIndex::new(store, config.tables.clone()),
            reviews: ReviewOrchestrator::new(cards.clone()),
            cards,
            local,
        })
    }

    /// Persist the local snapshot after a mutating command
    pub fn save(&self) -> Result<()> {
        if let Some((store, path)) = &self.local {
            store
                .save(path)
                .with_context(|| format!("Failed to save local store {}", path.display()))?;
        }
        Ok(())
    }
}

/// Split a comma-separated tag list
pub fn parse_tags(tags: Option<&str>) -> Option<Vec<String>> {
    tags.map(|t| t.split(',').map(|s| s.trim().to_string()).collect())
}
