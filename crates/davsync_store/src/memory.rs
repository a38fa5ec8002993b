//! In-memory cursor store for testing.

use crate::backend::{CursorStore, StoreStats};
use crate::error::{StoreError, StoreResult};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

/// An in-memory cursor store.
///
/// Suitable for unit tests, integration tests and deployments that accept
/// losing every sync token on restart.
///
/// [`close`](Self::close) makes every subsequent call fail with
/// [`StoreError::Closed`], which lets tests exercise persistence faults.
///
/// # Example
///
/// ```rust
/// use davsync_store::{CursorStore, InMemoryCursorStore};
///
/// let store = InMemoryCursorStore::new();
/// store.remember_alias("alice:AABB", "0a0b", "ev-1").unwrap();
/// assert_eq!(store.get_alias("alice:AABB", "0a0b").unwrap().as_deref(), Some("ev-1"));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryCursorStore {
    cursors: RwLock<HashMap<(String, String), Vec<u8>>>,
    aliases: RwLock<HashMap<(String, String), String>>,
    closed: AtomicBool,
}

impl InMemoryCursorStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Closes the store. Every later call returns [`StoreError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Re-opens a closed store, keeping its contents.
    pub fn reopen(&self) {
        self.closed.store(false, Ordering::SeqCst);
    }

    fn check_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

impl CursorStore for InMemoryCursorStore {
    fn get_cursor(&self, collection: &str, label: &str) -> StoreResult<Option<Vec<u8>>> {
        self.check_open()?;
        Ok(self
            .cursors
            .read()
            .get(&(collection.to_string(), label.to_string()))
            .cloned())
    }

    fn put_cursor(&self, collection: &str, label: &str, state: &[u8]) -> StoreResult<()> {
        self.check_open()?;
        self.cursors
            .write()
            .insert((collection.to_string(), label.to_string()), state.to_vec());
        Ok(())
    }

    fn remember_alias(
        &self,
        collection: &str,
        internal_key: &str,
        object_id: &str,
    ) -> StoreResult<()> {
        self.check_open()?;
        self.aliases.write().insert(
            (collection.to_string(), internal_key.to_string()),
            object_id.to_string(),
        );
        Ok(())
    }

    fn get_alias(&self, collection: &str, internal_key: &str) -> StoreResult<Option<String>> {
        self.check_open()?;
        Ok(self
            .aliases
            .read()
            .get(&(collection.to_string(), internal_key.to_string()))
            .cloned())
    }

    fn labels(&self, collection: &str) -> StoreResult<Vec<String>> {
        self.check_open()?;
        let labels: BTreeSet<String> = self
            .cursors
            .read()
            .keys()
            .filter(|(c, _)| c == collection)
            .map(|(_, label)| label.clone())
            .collect();
        Ok(labels.into_iter().collect())
    }

    fn stats(&self) -> StoreResult<StoreStats> {
        self.check_open()?;
        Ok(StoreStats {
            cursors: self.cursors.read().len() as u64,
            aliases: self.aliases.read().len() as u64,
        })
    }
}
