//! Error types for the sync engine.

use davsync_core::CoreError;
use davsync_store::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during a sync exchange.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The client's token has no stored cursor. The client must resync
    /// from scratch.
    #[error("sync token '{token}' is not valid for collection {collection}")]
    ExpiredToken {
        /// Collection id.
        collection: String,
        /// The token the client sent.
        token: String,
    },

    /// The collection does not exist.
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    /// The collection id is malformed.
    #[error("invalid collection id '{id}': {reason}")]
    InvalidCollectionId {
        /// The offending id.
        id: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The backing groupware store failed.
    #[error("backing store error: {0}")]
    BackingStore(String),

    /// The cursor store failed.
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),
}

/// How the protocol layer should answer a failed exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The token is unusable; the client must start over without one.
    ResyncRequired,
    /// The collection does not exist.
    NotFound,
    /// The server failed; the client may retry with the same token.
    ServerError,
}

impl SyncOutcome {
    /// HTTP status for a `sync-collection` REPORT answered with this outcome.
    pub fn status_code(self) -> u16 {
        match self {
            // valid-sync-token precondition
            SyncOutcome::ResyncRequired => 403,
            SyncOutcome::NotFound => 404,
            SyncOutcome::ServerError => 500,
        }
    }
}

impl SyncError {
    /// Creates an expired token error.
    pub fn expired_token(collection: impl Into<String>, token: impl Into<String>) -> Self {
        Self::ExpiredToken {
            collection: collection.into(),
            token: token.into(),
        }
    }

    /// Maps the error to a protocol outcome.
    pub fn outcome(&self) -> SyncOutcome {
        match self {
            SyncError::ExpiredToken { .. } => SyncOutcome::ResyncRequired,
            SyncError::CollectionNotFound(_) | SyncError::InvalidCollectionId { .. } => {
                SyncOutcome::NotFound
            }
            SyncError::BackingStore(_) | SyncError::Persistence(_) => SyncOutcome::ServerError,
        }
    }

    /// Returns true if the client can correct the error itself.
    pub fn is_client_error(&self) -> bool {
        !self.is_server_error()
    }

    /// Returns true if the server failed.
    pub fn is_server_error(&self) -> bool {
        self.outcome() == SyncOutcome::ServerError
    }
}

impl From<CoreError> for SyncError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Persistence(e) => SyncError::Persistence(e),
            CoreError::CollectionNotFound { collection } => SyncError::CollectionNotFound(collection),
            CoreError::InvalidCollectionId { id, reason } => {
                SyncError::InvalidCollectionId { id, reason }
            }
            other => SyncError::BackingStore(other.to_string()),
        }
    }
}
