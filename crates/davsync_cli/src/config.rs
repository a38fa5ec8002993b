//! Configuration file handling.

use davsync_engine::SyncConfig;
use davsync_store::StoreConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Io {
        /// The file that was requested.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The file is not valid TOML or has unexpected fields.
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Contents of a `davsync.toml` file.
///
/// ```toml
/// [store]
/// url = "sqlite:/var/lib/davsync/syncstate.db"
/// pool_size = 4
///
/// [sync]
/// max_batch_size = 500
/// default_batch_size = 100
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Cursor database settings.
    pub store: StoreConfig,
    /// Sync exchange limits.
    pub sync: SyncConfig,
}

impl FileConfig {
    /// Parses configuration from TOML text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Loads the file at `path`, or the defaults if no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            None => Ok(Self::default()),
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::parse(&text)
            }
        }
    }

    /// Replaces the store url if `db` is set.
    #[must_use]
    pub fn with_db_override(mut self, db: Option<String>) -> Self {
        if let Some(url) = db {
            self.store.url = url;
        }
        self
    }
}
