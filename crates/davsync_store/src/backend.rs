//! Cursor store trait definition.

use crate::error::StoreResult;
use serde::Serialize;

/// Row counts of a cursor store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Number of persisted cursors.
    pub cursors: u64,
    /// Number of remembered identity aliases.
    pub aliases: u64,
}

/// Persistence for sync cursors and identity aliases.
///
/// A cursor store is the only owner of persisted cursors and aliases.
/// Callers never touch the underlying database directly.
///
/// # Invariants
///
/// - `put_cursor` is an upsert; repeating it with the same label is not an error
/// - `get_cursor` returns exactly the bytes last stored under a label
/// - `remember_alias` is an upsert and idempotent
/// - Every error is surfaced; a failed write is never silently dropped
///
/// # Implementors
///
/// - [`super::SqliteCursorStore`] - For persistent storage
/// - [`super::InMemoryCursorStore`] - For testing
pub trait CursorStore: Send + Sync {
    /// Returns the cursor state stored under `label` for `collection`.
    ///
    /// Returns `Ok(None)` if no such cursor exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be read or the stored
    /// state is corrupted.
    fn get_cursor(&self, collection: &str, label: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Stores `state` under `label` for `collection`, replacing any
    /// previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn put_cursor(&self, collection: &str, label: &str, state: &[u8]) -> StoreResult<()>;

    /// Records that `internal_key` in `collection` is visible to clients
    /// as `object_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn remember_alias(&self, collection: &str, internal_key: &str, object_id: &str)
        -> StoreResult<()>;

    /// Returns the object id remembered for `internal_key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be read.
    fn get_alias(&self, collection: &str, internal_key: &str) -> StoreResult<Option<String>>;

    /// Returns all cursor labels stored for `collection`, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be read.
    fn labels(&self, collection: &str) -> StoreResult<Vec<String>>;

    /// Returns row counts for both tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be read.
    fn stats(&self) -> StoreResult<StoreStats>;
}

impl<T: CursorStore + ?Sized> CursorStore for std::sync::Arc<T> {
    fn get_cursor(&self, collection: &str, label: &str) -> StoreResult<Option<Vec<u8>>> {
        (**self).get_cursor(collection, label)
    }

    fn put_cursor(&self, collection: &str, label: &str, state: &[u8]) -> StoreResult<()> {
        (**self).put_cursor(collection, label, state)
    }

    fn remember_alias(
        &self,
        collection: &str,
        internal_key: &str,
        object_id: &str,
    ) -> StoreResult<()> {
        (**self).remember_alias(collection, internal_key, object_id)
    }

    fn get_alias(&self, collection: &str, internal_key: &str) -> StoreResult<Option<String>> {
        (**self).get_alias(collection, internal_key)
    }

    fn labels(&self, collection: &str) -> StoreResult<Vec<String>> {
        (**self).labels(collection)
    }

    fn stats(&self) -> StoreResult<StoreStats> {
        (**self).stats()
    }
}
