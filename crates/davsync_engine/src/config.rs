//! Configuration for the sync engine.

use serde::Deserialize;

/// Configuration for sync exchanges.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Upper bound on the number of changes returned by one exchange,
    /// whatever the client asks for.
    pub max_batch_size: u32,
    /// Number of changes returned when the client sets no limit.
    pub default_batch_size: u32,
}

impl SyncConfig {
    /// Creates a configuration with default limits.
    pub fn new() -> Self {
        Self {
            max_batch_size: 500,
            default_batch_size: 100,
        }
    }

    /// Sets the maximum batch size.
    #[must_use]
    pub fn with_max_batch_size(mut self, size: u32) -> Self {
        self.max_batch_size = size;
        self
    }

    /// Sets the default batch size.
    #[must_use]
    pub fn with_default_batch_size(mut self, size: u32) -> Self {
        self.default_batch_size = size;
        self
    }

    /// The batch bound for a client request: the requested (or default)
    /// size, capped at the maximum and never below one.
    pub fn effective_batch_size(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_batch_size)
            .min(self.max_batch_size)
            .max(1)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}
