//! Identifier types shared by every davsync layer.

use crate::error::{CoreError, CoreResult};
use std::fmt;

/// Identifies a calendar or address book, in the form
/// `<principal>:<internalFolderKey>`.
///
/// The folder key is the hex-encoded source key of the backing folder.
/// Collection ids are stable for the lifetime of the folder and never
/// reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionId(String);

impl CollectionId {
    /// Wraps an existing collection id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Composes a collection id from a principal and a binary folder key.
    pub fn compose(principal: &str, folder_key: &[u8]) -> Self {
        Self(format!("{principal}:{}", hex::encode_upper(folder_key)))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the principal part, if the id has one.
    pub fn principal(&self) -> Option<&str> {
        self.0.rsplit_once(':').map(|(principal, _)| principal)
    }

    /// Returns the decoded folder key.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidCollectionId`] if the key part is empty
    /// or not valid hex.
    pub fn folder_key(&self) -> CoreResult<Vec<u8>> {
        let key = self
            .0
            .rsplit_once(':')
            .map_or(self.0.as_str(), |(_, key)| key);
        if key.is_empty() {
            return Err(CoreError::invalid_collection_id(
                &self.0,
                "empty folder key",
            ));
        }
        hex::decode(key).map_err(|e| CoreError::invalid_collection_id(&self.0, e.to_string()))
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CollectionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// What a collection holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    /// Calendar folder; objects are iCalendar resources.
    Calendar,
    /// Address book folder; objects are vCard resources.
    AddressBook,
}

impl CollectionKind {
    /// The fixed suffix appended to object ids to form resource names.
    pub fn extension(self) -> &'static str {
        match self {
            CollectionKind::Calendar => ".ics",
            CollectionKind::AddressBook => ".vcf",
        }
    }

    /// Whether the global object id takes part in identity resolution.
    pub fn has_global_id(self) -> bool {
        matches!(self, CollectionKind::Calendar)
    }
}

/// The backing store's native per-item content key.
///
/// Always present, but not stable across moves between folders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InternalKey(Vec<u8>);

impl InternalKey {
    /// Creates a key from raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Parses a hex-encoded key.
    pub fn from_hex(hex_key: &str) -> Option<Self> {
        hex::decode(hex_key).ok().map(Self)
    }

    /// Returns the lowercase hex encoding used for transport.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns true if the key has no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for InternalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// The identifier a client sees for an object, without extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(String);

impl ObjectId {
    /// Wraps an object id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the id and returns the inner string.
    pub fn into_string(self) -> String {
        self.0
    }

    /// Returns the resource name `<id><extension>` for a collection kind.
    pub fn uri(&self, kind: CollectionKind) -> String {
        format!("{}{}", self.0, kind.extension())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An opaque handle to a message in the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageHandle(Vec<u8>);

impl MessageHandle {
    /// Creates a handle from the store's entry id.
    pub fn new(entry_id: impl Into<Vec<u8>>) -> Self {
        Self(entry_id.into())
    }

    /// Returns the store's entry id.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// An opened backing folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderHandle {
    /// The collection this folder backs.
    pub collection: CollectionId,
    /// The folder's source key.
    pub key: Vec<u8>,
    /// What the folder holds.
    pub kind: CollectionKind,
}

/// Strips `extension` from the end of `uri`, if present.
///
/// Resource names with another extension are returned unchanged.
pub fn object_id_from_uri<'a>(uri: &'a str, extension: &str) -> &'a str {
    uri.strip_suffix(extension).unwrap_or(uri)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_id_parts() {
        let id = CollectionId::new("alice:AABB");
        assert_eq!(id.principal(), Some("alice"));
        assert_eq!(id.folder_key().unwrap(), vec![0xAA, 0xBB]);

        let bare = CollectionId::new("0a0b");
        assert_eq!(bare.principal(), None);
        assert_eq!(bare.folder_key().unwrap(), vec![0x0A, 0x0B]);
    }

    #[test]
    fn collection_id_compose() {
        let id = CollectionId::compose("alice", &[0xAA, 0xBB]);
        assert_eq!(id.as_str(), "alice:AABB");
        assert_eq!(id.to_string(), "alice:AABB");
    }

    #[test]
    fn invalid_folder_keys() {
        assert!(matches!(
            CollectionId::new("alice:xyz").folder_key(),
            Err(CoreError::InvalidCollectionId { .. })
        ));
        assert!(matches!(
            CollectionId::new("alice:").folder_key(),
            Err(CoreError::InvalidCollectionId { .. })
        ));
    }

    #[test]
    fn kind_extensions() {
        assert_eq!(CollectionKind::Calendar.extension(), ".ics");
        assert_eq!(CollectionKind::AddressBook.extension(), ".vcf");
        assert!(CollectionKind::Calendar.has_global_id());
        assert!(!CollectionKind::AddressBook.has_global_id());
    }

    #[test]
    fn internal_key_hex() {
        let key = InternalKey::new(vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(key.to_hex(), "deadbeef");
        assert_eq!(InternalKey::from_hex("DEADBEEF"), Some(key));
        assert_eq!(InternalKey::from_hex("xyz"), None);
    }

    #[test]
    fn object_uri() {
        let id = ObjectId::new("ev-1");
        assert_eq!(id.uri(CollectionKind::Calendar), "ev-1.ics");
        assert_eq!(id.uri(CollectionKind::AddressBook), "ev-1.vcf");
    }

    #[test]
    fn object_id_from_uri_strips_matching_extension() {
        assert_eq!(object_id_from_uri("1234.ics", ".ics"), "1234");
        assert_eq!(object_id_from_uri("5678AF.vcf", ".vcf"), "5678AF");
        assert_eq!(object_id_from_uri("123400.vcf", ".ics"), "123400.vcf");
        assert_eq!(object_id_from_uri("1234.ics", ".vcf"), "1234.ics");
    }
}
