//! Error types for cursor store operations.

use thiserror::Error;

/// Result type for cursor store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in a cursor store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The SQLite database reported an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// No pooled connection could be obtained.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// A stored value could not be decoded.
    #[error("store corrupted: {0}")]
    Corrupted(String),

    /// The connection string is not understood.
    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),

    /// The store is closed.
    #[error("store is closed")]
    Closed,
}
