//! Cursor store configuration.

use crate::error::{StoreError, StoreResult};
use serde::Deserialize;
use std::path::PathBuf;

/// Default location of the sync database.
pub const DEFAULT_URL: &str = "sqlite:/tmp/syncstate.db";

/// Configuration for opening a [`super::SqliteCursorStore`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Connection string: `sqlite:<path>`, a bare path, or
    /// `sqlite::memory:` / `:memory:` for a private in-memory database.
    pub url: String,

    /// Maximum number of pooled connections (file databases only).
    pub pool_size: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            pool_size: 8,
        }
    }
}

/// Where the database lives, parsed from [`StoreConfig::url`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Location {
    Memory,
    File(PathBuf),
}

impl StoreConfig {
    /// Creates a configuration for the given connection string.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Creates a configuration for a private in-memory database.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(":memory:")
    }

    /// Sets the maximum number of pooled connections.
    #[must_use]
    pub fn pool_size(mut self, size: u32) -> Self {
        self.pool_size = size;
        self
    }

    pub(crate) fn location(&self) -> StoreResult<Location> {
        let url = self.url.trim();
        let rest = match url.split_once(':') {
            Some(("sqlite", rest)) => rest,
            // single letters are windows drive prefixes
            Some((scheme, _)) if scheme.len() > 1 && scheme != "file" => {
                return Err(StoreError::InvalidConnectionString(format!(
                    "unsupported scheme '{scheme}'"
                )));
            }
            _ => url,
        };

        match rest {
            "" => Err(StoreError::InvalidConnectionString(
                "missing database path".into(),
            )),
            ":memory:" => Ok(Location::Memory),
            path => Ok(Location::File(PathBuf::from(path.strip_prefix("file:").unwrap_or(path)))),
        }
    }
}
