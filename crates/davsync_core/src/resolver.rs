//! Mapping between client-visible object ids and backing store messages.

use crate::backend::GroupwareStore;
use crate::cache::PropertyTagCache;
use crate::error::{CoreError, CoreResult};
use crate::global_id::{encapsulate_uid, extract_uid, is_outlook_goid, is_uuid};
use crate::identity::Identity;
use crate::property::{NamedPropertyTags, PropTag, PropValue, PropertySnapshot, Restriction};
use crate::types::{
    CollectionId, CollectionKind, FolderHandle, InternalKey, MessageHandle, ObjectId,
};
use percent_encoding::percent_decode_str;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Resolves object ids for messages and messages for object ids.
///
/// The resolver owns the per-collection property-tag cache. It is
/// `Send + Sync` whenever the store is, and is meant to be shared by all
/// request handlers of a process.
///
/// # Example
///
/// ```rust
/// use davsync_core::{CollectionId, CollectionKind, IdentityResolver, MemoryGroupwareStore};
/// use std::sync::Arc;
///
/// let store = Arc::new(MemoryGroupwareStore::new());
/// let collection = CollectionId::new("alice:AABB");
/// store.create_folder(&collection, CollectionKind::Calendar).unwrap();
///
/// let resolver = IdentityResolver::new(store);
/// let message = resolver.create_message(&collection, "ev-1").unwrap();
/// assert_eq!(resolver.resolve_object_id(&collection, &message).unwrap().as_str(), "ev-1");
/// assert_eq!(resolver.find_message(&collection, "ev-1").unwrap(), Some(message));
/// ```
pub struct IdentityResolver<S: GroupwareStore> {
    store: Arc<S>,
    tags: PropertyTagCache,
}

impl<S: GroupwareStore> IdentityResolver<S> {
    /// Creates a resolver over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            tags: PropertyTagCache::new(),
        }
    }

    /// Returns the backing store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Opens the folder backing `collection`.
    ///
    /// # Errors
    ///
    /// Returns `CollectionNotFound` or `InvalidCollectionId` from the store.
    pub fn open_folder(&self, collection: &CollectionId) -> CoreResult<FolderHandle> {
        self.store.open_folder(collection)
    }

    /// Returns the named property tags of the folder's collection,
    /// resolving them through the store on first use.
    ///
    /// # Errors
    ///
    /// Returns backing store faults.
    pub fn named_tags(&self, folder: &FolderHandle) -> CoreResult<NamedPropertyTags> {
        self.tags.get_or_resolve(&folder.collection, || {
            trace!("Resolving named properties for {}", folder.collection);
            self.store.resolve_named_properties(folder)
        })
    }

    /// Forgets the cached tags of `collection`.
    pub fn invalidate(&self, collection: &CollectionId) {
        if self.tags.invalidate(collection) {
            debug!("Dropped cached property tags of {}", collection);
        }
    }

    /// Derives the client-visible id of `message`.
    ///
    /// # Errors
    ///
    /// Returns `IndeterminateIdentity` if not even the content key can be
    /// read, and backing store faults.
    pub fn resolve_object_id(
        &self,
        collection: &CollectionId,
        message: &MessageHandle,
    ) -> CoreResult<ObjectId> {
        let folder = self.open_folder(collection)?;
        let tags = self.named_tags(&folder)?;
        let snapshot = self
            .store
            .read_properties(&folder, message, &read_tags(&tags))?;

        let identity = Identity::from_snapshot(&snapshot, &tags, folder.kind)
            .ok_or(CoreError::IndeterminateIdentity)?;
        let object_id = identity.object_id();
        trace!("Resolved {:?} to {}", identity, object_id);
        Ok(object_id)
    }

    /// Finds the message a client means by `object_id`.
    ///
    /// Hex ids are first tried as content keys. Otherwise, or on a miss,
    /// the folder is searched for a message whose external reference (or,
    /// in calendars, global id) matches the id. Several matches are a
    /// consistency anomaly: the first one is returned.
    ///
    /// Returns `Ok(None)` if no message matches.
    ///
    /// # Errors
    ///
    /// Returns backing store faults only.
    pub fn find_message(
        &self,
        collection: &CollectionId,
        object_id: &str,
    ) -> CoreResult<Option<MessageHandle>> {
        let folder = self.open_folder(collection)?;
        let id = decode_object_id(object_id);
        let hex_bytes = if is_hex_id(&id) {
            hex::decode(id.as_bytes()).ok()
        } else {
            None
        };

        if let Some(bytes) = &hex_bytes {
            let key = InternalKey::new(bytes.clone());
            if let Some(message) = self.store.open_by_content_key(&folder, &key)? {
                debug!("Found {} by content key in {}", id, collection);
                return Ok(Some(message));
            }
        }

        let tags = self.named_tags(&folder)?;
        let restriction = search_restriction(&id, hex_bytes.as_deref(), &tags, folder.kind);
        let matches = self.store.find_messages(&folder, &restriction)?;

        if matches.len() > 1 {
            warn!(
                "Found {} messages for id {} in {}, using the first",
                matches.len(),
                id,
                collection
            );
        }
        match matches.into_iter().next() {
            Some(message) => {
                debug!("Found {} by property search in {}", id, collection);
                Ok(Some(message))
            }
            None => {
                debug!("No message for {} in {}", id, collection);
                Ok(None)
            }
        }
    }

    /// Creates a message in `collection` and stamps it with the
    /// client-chosen `object_id` as external reference.
    ///
    /// # Errors
    ///
    /// Returns backing store faults.
    pub fn create_message(
        &self,
        collection: &CollectionId,
        object_id: &str,
    ) -> CoreResult<MessageHandle> {
        let folder = self.open_folder(collection)?;
        let tags = self.named_tags(&folder)?;
        let message = self.store.create_message(&folder)?;
        self.store.write_properties(
            &folder,
            &message,
            &PropertySnapshot::new().with(tags.external_ref, PropValue::String(object_id.into())),
        )?;
        debug!("Created {} in {}", object_id, collection);
        Ok(message)
    }

    /// Strips `extension` from `uri` if it ends with it.
    pub fn object_id_from_uri<'a>(uri: &'a str, extension: &str) -> &'a str {
        crate::types::object_id_from_uri(uri, extension)
    }

    /// Returns the resource name of `object_id` in a collection of `kind`.
    pub fn object_uri(object_id: &ObjectId, kind: CollectionKind) -> String {
        object_id.uri(kind)
    }
}

fn read_tags(tags: &NamedPropertyTags) -> Vec<PropTag> {
    let mut read = tags.identity_tags().to_vec();
    read.push(tags.external_ref.with_type(PropTag::TYPE_BINARY));
    read
}

// Some clients percent-encode characters such as '@' in resource names.
fn decode_object_id(object_id: &str) -> Cow<'_, str> {
    percent_decode_str(object_id)
        .decode_utf8()
        .unwrap_or(Cow::Borrowed(object_id))
}

fn is_hex_id(id: &str) -> bool {
    !id.is_empty() && id.len() % 2 == 0 && id.bytes().all(|b| b.is_ascii_hexdigit())
}

fn search_restriction(
    id: &str,
    hex_bytes: Option<&[u8]>,
    tags: &NamedPropertyTags,
    kind: CollectionKind,
) -> Restriction {
    let binary_ref = tags.external_ref.with_type(PropTag::TYPE_BINARY);
    let mut alternatives = vec![
        Restriction::Eq(tags.external_ref, PropValue::String(id.to_string())),
        Restriction::Eq(binary_ref, PropValue::Binary(id.as_bytes().to_vec())),
    ];

    if let Some(bytes) = hex_bytes {
        alternatives.push(Restriction::Eq(binary_ref, PropValue::Binary(bytes.to_vec())));
    }

    if kind.has_global_id() {
        if let Some(bytes) = hex_bytes {
            alternatives.push(Restriction::Eq(tags.global_id, PropValue::Binary(bytes.to_vec())));
            if is_outlook_goid(id) {
                if let Some(uid) = extract_uid(bytes) {
                    trace!("Id {} wraps uid {}", id, uid);
                    alternatives.push(Restriction::Eq(tags.external_ref, PropValue::String(uid)));
                }
            }
        }
        if is_uuid(id) {
            if let Some(goid) = encapsulate_uid(id) {
                alternatives.push(Restriction::Eq(tags.global_id, PropValue::Binary(goid)));
            }
        }
    }

    Restriction::Or(alternatives)
}
