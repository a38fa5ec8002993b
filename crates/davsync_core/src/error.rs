//! Error types for davsync core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while resolving identities or talking to the
/// backing store.
///
/// "Not found" for objects is not an error: lookups return `Ok(None)`.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The cursor and alias store failed.
    #[error("persistence error: {0}")]
    Persistence(#[from] davsync_store::StoreError),

    /// The backing groupware store failed.
    #[error("backing store error: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },

    /// The collection does not exist in the backing store.
    #[error("collection not found: {collection}")]
    CollectionNotFound {
        /// The collection that was requested.
        collection: String,
    },

    /// The collection id is malformed.
    #[error("invalid collection id '{id}': {reason}")]
    InvalidCollectionId {
        /// The offending id.
        id: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Not even the content key of an object could be read.
    #[error("indeterminate identity: object has no readable content key")]
    IndeterminateIdentity,

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a backing store error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Creates a collection not found error.
    pub fn collection_not_found(collection: impl Into<String>) -> Self {
        Self::CollectionNotFound {
            collection: collection.into(),
        }
    }

    /// Creates an invalid collection id error.
    pub fn invalid_collection_id(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCollectionId {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}
