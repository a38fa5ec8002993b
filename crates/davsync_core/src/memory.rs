//! In-memory groupware store for testing.

use crate::backend::{ChangeFeedSession, ChangeSink, GroupwareStore};
use crate::error::{CoreError, CoreResult};
use crate::property::{
    NamedProperty, NamedPropertyTags, PropTag, PropValue, PropertySnapshot, Restriction,
    EXTERNAL_REF, GLOBAL_ID,
};
use crate::types::{CollectionId, CollectionKind, FolderHandle, InternalKey, MessageHandle};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Which change feed operation an injected fault hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFault {
    /// `open_change_feed` fails.
    Open,
    /// Every `drive` call fails.
    Drive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Created,
    Modified,
    Deleted,
}

#[derive(Debug)]
struct Folder {
    kind: CollectionKind,
    key: Vec<u8>,
    messages: BTreeMap<InternalKey, PropertySnapshot>,
    log: Vec<(u64, InternalKey, Change)>,
    head: u64,
}

impl Folder {
    fn record(&mut self, key: InternalKey, change: Change) {
        self.head += 1;
        self.log.push((self.head, key, change));
    }
}

#[derive(Debug, Default)]
struct Inner {
    folders: HashMap<CollectionId, Folder>,
    next_key: u64,
    fault: Option<FeedFault>,
}

impl Inner {
    fn folder(&self, collection: &CollectionId) -> CoreResult<&Folder> {
        self.folders
            .get(collection)
            .ok_or_else(|| CoreError::collection_not_found(collection.as_str()))
    }

    fn folder_mut(&mut self, collection: &CollectionId) -> CoreResult<&mut Folder> {
        self.folders
            .get_mut(collection)
            .ok_or_else(|| CoreError::collection_not_found(collection.as_str()))
    }

    // Content keys are unique across the whole store so that a moved
    // message never reuses a key.
    fn mint_key(&mut self) -> InternalKey {
        self.next_key += 1;
        let mut key = vec![0xC0, 0xDE];
        key.extend_from_slice(&self.next_key.to_be_bytes());
        InternalKey::new(key)
    }

    fn insert(
        &mut self,
        collection: &CollectionId,
        mut props: PropertySnapshot,
    ) -> CoreResult<InternalKey> {
        let key = self.mint_key();
        let folder = self.folder_mut(collection)?;
        props.set(PropTag::CONTENT_KEY, PropValue::Binary(key.as_bytes().to_vec()));
        folder.messages.insert(key.clone(), props);
        folder.record(key.clone(), Change::Created);
        Ok(key)
    }
}

// Named properties live in the 0x8000 range, keyed by their numeric id.
const fn named_tag(property: &NamedProperty) -> PropTag {
    PropTag::new(0x8000 | property.id as u16, property.prop_type)
}

/// An in-memory groupware store.
///
/// Folders hold messages keyed by content key plus an append-only change
/// log. Change feed state is the sequence number of the last delivered
/// change as a little-endian `u64`; eight zero bytes mean "start of time".
///
/// Configuring a feed collapses the log after the state into one change
/// per message:
///
/// - deleted, and present at the state: delete
/// - created after the last complete drain: add
/// - otherwise: modify
///
/// Messages created and deleted after the state are not reported. Changes
/// are delivered ordered by their latest log entry. The state captured
/// after a partial drain also carries where the last complete drain
/// ended, so messages first reported by a later batch are still adds.
///
/// # Example
///
/// ```rust
/// use davsync_core::{CollectionId, CollectionKind, MemoryGroupwareStore, PropertySnapshot};
///
/// let store = MemoryGroupwareStore::new();
/// let collection = CollectionId::new("alice:AABB");
/// store.create_folder(&collection, CollectionKind::Calendar).unwrap();
/// let key = store.insert(&collection, PropertySnapshot::new()).unwrap();
/// assert_eq!(store.message_count(&collection), 1);
/// assert!(store.delete(&collection, &key).unwrap());
/// ```
#[derive(Debug, Default)]
pub struct MemoryGroupwareStore {
    inner: Arc<RwLock<Inner>>,
    named_property_lookups: AtomicUsize,
}

impl MemoryGroupwareStore {
    /// Tag assigned to the external reference.
    pub const EXTERNAL_REF_TAG: PropTag = named_tag(&EXTERNAL_REF);
    /// Tag assigned to the global object id.
    pub const GLOBAL_ID_TAG: PropTag = named_tag(&GLOBAL_ID);

    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a folder for `collection`. An existing folder is kept.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCollectionId` if the id has no valid folder key.
    pub fn create_folder(
        &self,
        collection: &CollectionId,
        kind: CollectionKind,
    ) -> CoreResult<FolderHandle> {
        let key = collection.folder_key()?;
        let mut inner = self.inner.write();
        let folder = inner.folders.entry(collection.clone()).or_insert_with(|| Folder {
            kind,
            key,
            messages: BTreeMap::new(),
            log: Vec::new(),
            head: 0,
        });
        Ok(FolderHandle {
            collection: collection.clone(),
            key: folder.key.clone(),
            kind: folder.kind,
        })
    }

    /// Removes a folder and everything in it. Returns true if it existed.
    pub fn remove_folder(&self, collection: &CollectionId) -> bool {
        self.inner.write().folders.remove(collection).is_some()
    }

    /// Adds a message with the given properties and returns its content key.
    ///
    /// # Errors
    ///
    /// Returns `CollectionNotFound` for unknown collections.
    pub fn insert(
        &self,
        collection: &CollectionId,
        props: PropertySnapshot,
    ) -> CoreResult<InternalKey> {
        self.inner.write().insert(collection, props)
    }

    /// Merges `props` into an existing message.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection or message does not exist.
    pub fn update(
        &self,
        collection: &CollectionId,
        key: &InternalKey,
        props: &PropertySnapshot,
    ) -> CoreResult<()> {
        let mut inner = self.inner.write();
        let folder = inner.folder_mut(collection)?;
        let message = folder
            .messages
            .get_mut(key)
            .ok_or_else(|| CoreError::backend(format!("no message {key} in {collection}")))?;
        message.merge(props);
        folder.record(key.clone(), Change::Modified);
        Ok(())
    }

    /// Deletes a message. Returns false if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns `CollectionNotFound` for unknown collections.
    pub fn delete(&self, collection: &CollectionId, key: &InternalKey) -> CoreResult<bool> {
        let mut inner = self.inner.write();
        let folder = inner.folder_mut(collection)?;
        if folder.messages.remove(key).is_none() {
            return Ok(false);
        }
        folder.record(key.clone(), Change::Deleted);
        Ok(true)
    }

    /// Moves a message to another folder. The message gets a fresh
    /// content key there, which is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if either collection or the message does not exist.
    pub fn move_message(
        &self,
        from: &CollectionId,
        key: &InternalKey,
        to: &CollectionId,
    ) -> CoreResult<InternalKey> {
        let mut inner = self.inner.write();
        inner.folder(to)?;
        let source = inner.folder_mut(from)?;
        let props = source
            .messages
            .remove(key)
            .ok_or_else(|| CoreError::backend(format!("no message {key} in {from}")))?;
        source.record(key.clone(), Change::Deleted);
        inner.insert(to, props)
    }

    /// Number of messages in a folder; zero for unknown folders.
    pub fn message_count(&self, collection: &CollectionId) -> usize {
        self.inner
            .read()
            .folders
            .get(collection)
            .map_or(0, |folder| folder.messages.len())
    }

    /// Number of times named properties were resolved.
    pub fn named_property_lookups(&self) -> usize {
        self.named_property_lookups.load(Ordering::SeqCst)
    }

    /// Makes change feed operations fail until [`clear_faults`](Self::clear_faults).
    pub fn fail_feed(&self, fault: FeedFault) {
        self.inner.write().fault = Some(fault);
    }

    /// Removes an injected fault.
    pub fn clear_faults(&self) {
        self.inner.write().fault = None;
    }

    fn handle(
        folder: &FolderHandle,
        inner: &Inner,
        message: &MessageHandle,
    ) -> CoreResult<InternalKey> {
        let key = InternalKey::new(message.as_bytes());
        if inner.folder(&folder.collection)?.messages.contains_key(&key) {
            Ok(key)
        } else {
            Err(CoreError::backend(format!(
                "no message {key} in {}",
                folder.collection
            )))
        }
    }
}

impl GroupwareStore for MemoryGroupwareStore {
    fn open_folder(&self, collection: &CollectionId) -> CoreResult<FolderHandle> {
        collection.folder_key()?;
        let inner = self.inner.read();
        let folder = inner.folder(collection)?;
        Ok(FolderHandle {
            collection: collection.clone(),
            key: folder.key.clone(),
            kind: folder.kind,
        })
    }

    fn resolve_named_properties(&self, folder: &FolderHandle) -> CoreResult<NamedPropertyTags> {
        self.inner.read().folder(&folder.collection)?;
        self.named_property_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(NamedPropertyTags {
            external_ref: Self::EXTERNAL_REF_TAG,
            global_id: Self::GLOBAL_ID_TAG,
        })
    }

    fn read_properties(
        &self,
        folder: &FolderHandle,
        message: &MessageHandle,
        tags: &[PropTag],
    ) -> CoreResult<PropertySnapshot> {
        let inner = self.inner.read();
        let key = Self::handle(folder, &inner, message)?;
        Ok(inner
            .folder(&folder.collection)?
            .messages
            .get(&key)
            .map(|props| props.project(tags))
            .unwrap_or_default())
    }

    fn write_properties(
        &self,
        folder: &FolderHandle,
        message: &MessageHandle,
        values: &PropertySnapshot,
    ) -> CoreResult<()> {
        let key = Self::handle(folder, &self.inner.read(), message)?;
        self.update(&folder.collection, &key, values)
    }

    fn create_message(&self, folder: &FolderHandle) -> CoreResult<MessageHandle> {
        let key = self.insert(&folder.collection, PropertySnapshot::new())?;
        Ok(MessageHandle::new(key.as_bytes()))
    }

    fn open_by_content_key(
        &self,
        folder: &FolderHandle,
        key: &InternalKey,
    ) -> CoreResult<Option<MessageHandle>> {
        let inner = self.inner.read();
        let found = inner.folder(&folder.collection)?.messages.contains_key(key);
        Ok(found.then(|| MessageHandle::new(key.as_bytes())))
    }

    fn find_messages(
        &self,
        folder: &FolderHandle,
        restriction: &Restriction,
    ) -> CoreResult<Vec<MessageHandle>> {
        let inner = self.inner.read();
        Ok(inner
            .folder(&folder.collection)?
            .messages
            .iter()
            .filter(|(_, props)| restriction.matches(props))
            .map(|(key, _)| MessageHandle::new(key.as_bytes()))
            .collect())
    }

    fn open_change_feed(&self, folder: &FolderHandle) -> CoreResult<Box<dyn ChangeFeedSession>> {
        let inner = self.inner.read();
        if inner.fault == Some(FeedFault::Open) {
            return Err(CoreError::backend("injected fault: cannot open change feed"));
        }
        inner.folder(&folder.collection)?;
        Ok(Box::new(MemoryFeedSession {
            inner: Arc::clone(&self.inner),
            collection: folder.collection.clone(),
            records: Vec::new(),
            position: 0,
            limit: 0,
            start: FeedState::at(0),
            head: 0,
            configured: false,
        }))
    }
}

#[derive(Debug)]
enum FeedRecord {
    Add {
        seq: u64,
        key: InternalKey,
        is_new: bool,
        snapshot: PropertySnapshot,
    },
    Delete {
        seq: u64,
        key: InternalKey,
    },
}

impl FeedRecord {
    fn seq(&self) -> u64 {
        match self {
            FeedRecord::Add { seq, .. } | FeedRecord::Delete { seq, .. } => *seq,
        }
    }
}

struct MemoryFeedSession {
    inner: Arc<RwLock<Inner>>,
    collection: CollectionId,
    records: Vec<FeedRecord>,
    position: usize,
    limit: usize,
    start: FeedState,
    head: u64,
    configured: bool,
}

impl MemoryFeedSession {
    fn bound(&self) -> usize {
        self.records.len().min(self.limit)
    }
}

/// Position of a feed session in a folder's change log.
///
/// `since` is the last delivered sequence number. `base` is where the
/// client's previous complete drain ended, so changes after it count as
/// new even when a partial drain moved `since` past their creation.
/// Encoded as `since` alone (8 bytes, little-endian) when both agree,
/// otherwise as `base` followed by `since` (16 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FeedState {
    base: u64,
    since: u64,
}

impl FeedState {
    fn at(seq: u64) -> Self {
        Self {
            base: seq,
            since: seq,
        }
    }

    fn decode(state: &[u8]) -> CoreResult<Self> {
        let word = |bytes: &[u8]| -> CoreResult<u64> {
            let bytes: [u8; 8] = bytes.try_into().map_err(|_| {
                CoreError::backend(format!("malformed feed state of {} bytes", state.len()))
            })?;
            Ok(u64::from_le_bytes(bytes))
        };
        match state.len() {
            16 => {
                let base = word(&state[..8])?;
                let since = word(&state[8..])?;
                if base > since {
                    return Err(CoreError::backend("feed state ends before its base"));
                }
                Ok(Self { base, since })
            }
            _ => word(state).map(Self::at),
        }
    }

    fn encode(self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(16);
        if self.base != self.since {
            bytes.extend_from_slice(&self.base.to_le_bytes());
        }
        bytes.extend_from_slice(&self.since.to_le_bytes());
        bytes
    }
}

fn collapse(folder: &Folder, state: FeedState) -> Vec<FeedRecord> {
    // messages created after the client's base
    let mut created_since_base: HashSet<&InternalKey> = HashSet::new();
    // key -> (created after `since`, last change, seq of last change)
    let mut latest: HashMap<&InternalKey, (bool, Change, u64)> = HashMap::new();
    for (seq, key, change) in folder.log.iter().filter(|(seq, _, _)| *seq > state.base) {
        if *change == Change::Created {
            created_since_base.insert(key);
        }
        if *seq <= state.since {
            continue;
        }
        let entry = latest.entry(key).or_insert((false, *change, *seq));
        entry.0 |= *change == Change::Created;
        entry.1 = *change;
        entry.2 = *seq;
    }

    let mut records: Vec<FeedRecord> = latest
        .into_iter()
        .filter_map(|(key, (created, last, seq))| match (created, last) {
            (true, Change::Deleted) => None,
            (false, Change::Deleted) => Some(FeedRecord::Delete {
                seq,
                key: key.clone(),
            }),
            _ => folder.messages.get(key).map(|props| FeedRecord::Add {
                seq,
                key: key.clone(),
                is_new: created_since_base.contains(key),
                snapshot: props.clone(),
            }),
        })
        .collect();
    records.sort_by_key(FeedRecord::seq);
    records
}

impl ChangeFeedSession for MemoryFeedSession {
    fn configure(&mut self, state: &[u8], batch_limit: u32) -> CoreResult<()> {
        let state = FeedState::decode(state)?;
        let inner = self.inner.read();
        let folder = inner.folder(&self.collection)?;

        self.records = collapse(folder, state);
        self.position = 0;
        self.limit = batch_limit as usize;
        self.start = state;
        self.head = folder.head.max(state.since);
        self.configured = true;
        trace!(
            "Feed for {} configured at {:?}: {} pending",
            self.collection,
            state,
            self.records.len()
        );
        Ok(())
    }

    fn drive(&mut self, sink: &mut dyn ChangeSink) -> CoreResult<bool> {
        if !self.configured {
            return Err(CoreError::invalid_operation("feed session not configured"));
        }
        if self.inner.read().fault == Some(FeedFault::Drive) {
            return Err(CoreError::backend("injected fault: change feed failed"));
        }

        let bound = self.bound();
        if self.position >= bound {
            return Ok(false);
        }

        match &self.records[self.position] {
            FeedRecord::Add {
                key,
                is_new,
                snapshot,
                ..
            } => {
                sink.on_add(key, *is_new, snapshot)?;
                self.position += 1;
            }
            FeedRecord::Delete { .. } => {
                let keys: Vec<InternalKey> = self.records[self.position..bound]
                    .iter()
                    .map_while(|record| match record {
                        FeedRecord::Delete { key, .. } => Some(key.clone()),
                        FeedRecord::Add { .. } => None,
                    })
                    .collect();
                sink.on_delete(&keys)?;
                self.position += keys.len();
            }
        }

        Ok(self.position < bound)
    }

    fn pending_count(&self) -> u32 {
        u32::try_from(self.records.len()).unwrap_or(u32::MAX)
    }

    fn capture_state(&self) -> CoreResult<Vec<u8>> {
        if !self.configured {
            return Err(CoreError::invalid_operation("feed session not configured"));
        }
        let state = if self.position >= self.records.len() {
            FeedState::at(self.head)
        } else if self.position == 0 {
            self.start
        } else {
            FeedState {
                base: self.start.base,
                since: self.records[self.position - 1].seq(),
            }
        };
        Ok(state.encode())
    }
}
