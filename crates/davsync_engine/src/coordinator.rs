//! The sync-collection exchange.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::importer::ChangeImporter;
use davsync_core::{CollectionId, GroupwareStore, IdentityResolver};
use davsync_store::CursorStore;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Change feed state meaning "start of time".
pub const INITIAL_STATE: [u8; 8] = [0; 8];

/// The answer to one sync exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncDelta {
    /// The token the client sends next time.
    pub sync_token: String,
    /// Resources created since the client's token.
    pub added: Vec<String>,
    /// Resources modified since the client's token.
    pub modified: Vec<String>,
    /// Resources deleted since the client's token.
    pub deleted: Vec<String>,
    /// More changes are pending beyond the batch bound. The client should
    /// sync again with the new token.
    pub has_more: bool,
}

impl SyncDelta {
    /// Number of changes in the delta.
    pub fn total(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len()
    }

    /// Returns true if the delta carries no changes.
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Statistics about sync exchanges.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Exchanges that committed a cursor.
    pub exchanges_completed: u64,
    /// Changes reported to clients.
    pub changes_delivered: u64,
    /// Exchanges cut short by the batch bound.
    pub partial_exchanges: u64,
    /// Requests rejected for an unknown token.
    pub expired_tokens: u64,
    /// Time of the last completed exchange.
    pub last_exchange_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Runs sync exchanges for DAV collections.
///
/// The coordinator is `Send + Sync` and is meant to be shared by all
/// request threads. Concurrent exchanges on the same token are
/// last-writer-wins.
///
/// # Example
///
/// ```rust
/// use davsync_core::{CollectionId, CollectionKind, MemoryGroupwareStore};
/// use davsync_engine::{SyncConfig, SyncCoordinator};
/// use davsync_store::InMemoryCursorStore;
/// use std::sync::Arc;
///
/// let store = Arc::new(MemoryGroupwareStore::new());
/// let collection = CollectionId::new("alice:AABB");
/// store.create_folder(&collection, CollectionKind::Calendar).unwrap();
///
/// let coordinator = SyncCoordinator::new(
///     SyncConfig::default(),
///     store,
///     Arc::new(InMemoryCursorStore::new()),
/// );
/// let delta = coordinator.sync(&collection, None, None).unwrap();
/// assert!(delta.is_empty());
/// assert!(!delta.sync_token.is_empty());
/// ```
pub struct SyncCoordinator<S: GroupwareStore, C: CursorStore> {
    config: SyncConfig,
    resolver: IdentityResolver<S>,
    cursors: Arc<C>,
    stats: RwLock<SyncStats>,
}

impl<S: GroupwareStore, C: CursorStore> SyncCoordinator<S, C> {
    /// Creates a coordinator over a groupware store and a cursor store.
    pub fn new(config: SyncConfig, store: Arc<S>, cursors: Arc<C>) -> Self {
        Self {
            config,
            resolver: IdentityResolver::new(store),
            cursors,
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the identity resolver, for object-level request handlers.
    pub fn resolver(&self) -> &IdentityResolver<S> {
        &self.resolver
    }

    /// Returns the cursor store.
    pub fn cursors(&self) -> &Arc<C> {
        &self.cursors
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Drops cached state for a deleted collection.
    pub fn forget_collection(&self, collection: &CollectionId) {
        self.resolver.invalidate(collection);
    }

    /// Reports the changes in `collection` since `client_token`.
    ///
    /// Without a token every object in the collection is reported as
    /// added. At most `batch_limit` changes (or the configured default)
    /// are returned; [`SyncDelta::has_more`] tells the client to call
    /// again with the returned token.
    ///
    /// A cursor is committed only after the whole batch was read. A
    /// failed exchange leaves the client's token valid.
    ///
    /// # Errors
    ///
    /// - [`SyncError::ExpiredToken`] if the token is unknown
    /// - [`SyncError::CollectionNotFound`] if the collection does not exist
    /// - [`SyncError::BackingStore`] or [`SyncError::Persistence`] on faults
    pub fn sync(
        &self,
        collection: &CollectionId,
        client_token: Option<&str>,
        batch_limit: Option<u32>,
    ) -> SyncResult<SyncDelta> {
        match self.exchange(collection, client_token, batch_limit) {
            Ok(delta) => {
                let mut stats = self.stats.write();
                stats.exchanges_completed += 1;
                stats.changes_delivered += delta.total() as u64;
                if delta.has_more {
                    stats.partial_exchanges += 1;
                }
                stats.last_exchange_time = Some(Instant::now());
                stats.last_error = None;
                Ok(delta)
            }
            Err(e) => {
                self.handle_error(&e);
                Err(e)
            }
        }
    }

    fn exchange(
        &self,
        collection: &CollectionId,
        client_token: Option<&str>,
        batch_limit: Option<u32>,
    ) -> SyncResult<SyncDelta> {
        let folder = self.resolver.open_folder(collection)?;

        let state = match client_token {
            None => INITIAL_STATE.to_vec(),
            Some(token) => self
                .cursors
                .get_cursor(collection.as_str(), token)?
                .ok_or_else(|| SyncError::expired_token(collection.as_str(), token))?,
        };

        let batch = self.config.effective_batch_size(batch_limit);
        let tags = self.resolver.named_tags(&folder)?;
        let mut session = self.resolver.store().open_change_feed(&folder)?;
        session.configure(&state, batch)?;

        let mut importer = ChangeImporter::new(self.cursors.as_ref(), &folder, tags, batch);
        while !importer.state().is_finished() && session.drive(&mut importer)? {}
        importer.finish();

        let pending = session.pending_count() as usize;
        let changes = importer.into_changes();
        let drained = changes.total();
        let has_more = pending > drained;
        if has_more {
            info!(
                "Partial sync of {}: {} of {} changes",
                collection, drained, pending
            );
        }

        // an empty incremental exchange leaves the stored cursor untouched
        let sync_token = match client_token {
            Some(token) if drained == 0 => token.to_string(),
            _ => {
                let new_state = session.capture_state()?;
                let token = Uuid::new_v4().simple().to_string();
                self.cursors
                    .put_cursor(collection.as_str(), &token, &new_state)?;
                token
            }
        };

        debug!(
            "Synced {} from {:?} to {}: {} added, {} modified, {} deleted",
            collection,
            client_token,
            sync_token,
            changes.added.len(),
            changes.modified.len(),
            changes.deleted.len()
        );

        Ok(SyncDelta {
            sync_token,
            added: changes.added,
            modified: changes.modified,
            deleted: changes.deleted,
            has_more,
        })
    }

    /// Handles an error by updating stats.
    fn handle_error(&self, error: &SyncError) {
        let mut stats = self.stats.write();
        if let SyncError::ExpiredToken { collection, token } = error {
            warn!("Unknown sync token {} for {}", token, collection);
            stats.expired_tokens += 1;
        }
        stats.last_error = Some(error.to_string());
    }
}
