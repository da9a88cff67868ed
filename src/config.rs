//! Configuration for the card store and its backing store
//!
//! Loaded from `config.toml` under the platform config directory (or an explicit
//! path), then overridden by `MEMORU_*` environment variables.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::kv::{HttpStore, KvError, KvStore, MemoryStore};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Store error: {0}")]
    Store(#[from] KvError),
}

/// Which store the card store talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-process store snapshotted to `data_file`
    #[default]
    Local,
    /// Remote gateway at `endpoint`
    Remote,
}

/// Names of the tables and indexes the card store uses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableNames {
    pub cards: String,
    pub users: String,
    pub reviews: String,
    /// Cards by `(user_id, next_review_at)`
    pub due_index: String,
    /// Cards by `(user_id, created_at)`
    pub created_index: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            cards: "memoru-cards".to_string(),
            users: "memoru-users".to_string(),
            reviews: "memoru-reviews".to_string(),
            due_index: "user_id-due-index".to_string(),
            created_index: "user_id-created-index".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoruConfig {
    pub backend: Backend,
    /// Snapshot file for the local backend
    pub data_file: Option<PathBuf>,
    /// Gateway base URL for the remote backend
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub tables: TableNames,
}

impl Default for MemoruConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Local,
            data_file: None,
            endpoint: None,
            api_token: None,
            request_timeout_secs: 10,
            connect_timeout_secs: 5,
            tables: TableNames::default(),
        }
    }
}

impl MemoruConfig {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("memoru").join("config.toml"))
    }

    /// Load from `path`, or the default location; a missing file yields defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, |name| std::env::var(name).ok())
    }

    /// [`MemoruConfig::load`] with an explicit environment lookup
    pub fn load_with_env(
        path: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);
        let mut config = match path {
            Some(p) if p.exists() => {
                let content = fs::read_to_string(&p)?;
                log::debug!("Loading config from {}", p.display());
                toml::from_str(&content)?
            }
            _ => Self::default(),
        };
        config.apply_env(lookup);
        config.validate()?;
        Ok(config)
    }

    /// Apply `MEMORU_*` overrides; `lookup` is the environment
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(endpoint) = lookup("MEMORU_ENDPOINT") {
            self.endpoint = Some(endpoint);
            self.backend = Backend::Remote;
        }
        if let Some(token) = lookup("MEMORU_API_TOKEN") {
            self.api_token = Some(token);
        }
        if let Some(file) = lookup("MEMORU_DATA_FILE") {
            self.data_file = Some(PathBuf::from(file));
        }
        if let Some(name) = lookup("MEMORU_CARDS_TABLE") {
            self.tables.cards = name;
        }
        if let Some(name) = lookup("MEMORU_USERS_TABLE") {
            self.tables.users = name;
        }
        if let Some(name) = lookup("MEMORU_REVIEWS_TABLE") {
            self.tables.reviews = name;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 || self.connect_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be greater than zero".to_string()));
        }
        if self.backend == Backend::Remote {
            match self.endpoint.as_deref() {
                Some(url) if url.starts_with("http://") || url.starts_with("https://") => {}
                Some(url) => {
                    return Err(ConfigError::Invalid(format!(
                        "endpoint must start with http:// or https://, got '{}'",
                        url
                    )))
                }
                None => {
                    return Err(ConfigError::Invalid(
                        "remote backend requires an endpoint".to_string(),
                    ))
                }
            }
        }
        Ok(())
    }

    /// Snapshot file for the local backend
    pub fn data_file(&self) -> Result<PathBuf, ConfigError> {
        self.data_file
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join("memoru").join("store.json")))
            .ok_or_else(|| ConfigError::Invalid("no data directory available".to_string()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Open the configured remote store
    pub fn open_remote(&self) -> Result<Arc<dyn KvStore>, ConfigError> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or_else(|| ConfigError::Invalid("remote backend requires an endpoint".to_string()))?;
        let store = HttpStore::new(
            endpoint,
            self.api_token.clone(),
            self.request_timeout(),
            self.connect_timeout(),
        )?;
        Ok(Arc::new(store))
    }

    /// Open the local snapshot store
    pub fn open_local(&self) -> Result<Arc<MemoryStore>, ConfigError> {
        Ok(Arc::new(MemoryStore::load(&self.data_file()?)?))
    }
}
