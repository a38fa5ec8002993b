//! Object identity derivation.

use crate::property::{NamedPropertyTags, PropTag, PropValue, PropertySnapshot};
use crate::types::{CollectionKind, InternalKey, ObjectId};

/// Where an object's client-visible id comes from.
///
/// Resolution order is fixed for every collection: external reference,
/// then global id (calendars only), then content key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// The client-chosen id stamped on creation.
    ExternalRef(String),
    /// A meeting item's global object id.
    GlobalId(Vec<u8>),
    /// The store's native content key.
    ContentKey(InternalKey),
}

impl Identity {
    /// Derives the identity of an object from its properties.
    ///
    /// Empty values are treated as absent. Returns `None` only when the
    /// snapshot has no content key either.
    pub fn from_snapshot(
        snapshot: &PropertySnapshot,
        tags: &NamedPropertyTags,
        kind: CollectionKind,
    ) -> Option<Identity> {
        if let Some(external) = external_ref(snapshot, tags.external_ref) {
            return Some(external);
        }

        if kind.has_global_id() {
            if let Some(PropValue::Binary(goid)) = non_empty(snapshot, tags.global_id) {
                return Some(Identity::GlobalId(goid.clone()));
            }
        }

        non_empty(snapshot, PropTag::CONTENT_KEY)
            .map(|value| Identity::ContentKey(InternalKey::new(value.as_bytes())))
    }

    /// The client-visible id; binary identities render as lowercase hex.
    pub fn object_id(&self) -> ObjectId {
        match self {
            Identity::ExternalRef(id) => ObjectId::new(id.clone()),
            Identity::GlobalId(goid) => ObjectId::new(hex::encode(goid)),
            Identity::ContentKey(key) => ObjectId::new(key.to_hex()),
        }
    }
}

fn non_empty(snapshot: &PropertySnapshot, tag: PropTag) -> Option<&PropValue> {
    snapshot.get(tag).filter(|value| !value.is_empty())
}

// The external reference may be stored as text or as binary depending on
// the client that wrote it; text wins.
fn external_ref(snapshot: &PropertySnapshot, tag: PropTag) -> Option<Identity> {
    let candidates = [
        non_empty(snapshot, tag),
        non_empty(snapshot, tag.with_type(PropTag::TYPE_BINARY)),
    ];

    candidates
        .iter()
        .flatten()
        .find_map(|value| match value {
            PropValue::String(s) => Some(Identity::ExternalRef(s.clone())),
            PropValue::Binary(_) => None,
        })
        .or_else(|| {
            candidates.iter().flatten().find_map(|value| match value {
                PropValue::Binary(b) => Some(Identity::ExternalRef(hex::encode(b))),
                PropValue::String(_) => None,
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TAGS: NamedPropertyTags = NamedPropertyTags {
        external_ref: PropTag(0x8025_001E),
        global_id: PropTag(0x8003_0102),
    };

    fn key(bytes: &[u8]) -> PropValue {
        PropValue::Binary(bytes.to_vec())
    }

    #[test]
    fn external_ref_wins() {
        let snapshot = PropertySnapshot::new()
            .with(TAGS.external_ref, PropValue::String("X".into()))
            .with(TAGS.global_id, key(&[9, 9]))
            .with(PropTag::CONTENT_KEY, key(&[0x0a, 0x0b]));

        let identity = Identity::from_snapshot(&snapshot, &TAGS, CollectionKind::Calendar).unwrap();
        assert_eq!(identity, Identity::ExternalRef("X".into()));
        assert_eq!(identity.object_id().as_str(), "X");
    }

    #[test]
    fn binary_external_ref_renders_hex() {
        let snapshot = PropertySnapshot::new()
            .with(TAGS.external_ref.with_type(PropTag::TYPE_BINARY), key(&[0xAB, 0x01]))
            .with(PropTag::CONTENT_KEY, key(&[0x0a]));

        let identity =
            Identity::from_snapshot(&snapshot, &TAGS, CollectionKind::AddressBook).unwrap();
        assert_eq!(identity.object_id().as_str(), "ab01");
    }

    #[test]
    fn global_id_only_for_calendars() {
        let snapshot = PropertySnapshot::new()
            .with(TAGS.global_id, key(&[0xCA, 0xFE]))
            .with(PropTag::CONTENT_KEY, key(&[0x0a, 0x0b]));

        let calendar = Identity::from_snapshot(&snapshot, &TAGS, CollectionKind::Calendar).unwrap();
        assert_eq!(calendar, Identity::GlobalId(vec![0xCA, 0xFE]));
        assert_eq!(calendar.object_id().as_str(), "cafe");

        let contacts =
            Identity::from_snapshot(&snapshot, &TAGS, CollectionKind::AddressBook).unwrap();
        assert_eq!(contacts.object_id().as_str(), "0a0b");
    }

    #[test]
    fn empty_values_are_skipped() {
        let snapshot = PropertySnapshot::new()
            .with(TAGS.external_ref, PropValue::String(String::new()))
            .with(TAGS.global_id, key(&[]))
            .with(PropTag::CONTENT_KEY, key(&[0x0a, 0x0b, 0x0c]));

        let identity = Identity::from_snapshot(&snapshot, &TAGS, CollectionKind::Calendar).unwrap();
        assert_eq!(identity, Identity::ContentKey(InternalKey::new(vec![0x0a, 0x0b, 0x0c])));
        assert_eq!(identity.object_id().as_str(), "0a0b0c");
    }

    #[test]
    fn no_content_key_is_indeterminate() {
        let snapshot = PropertySnapshot::new().with(TAGS.global_id, key(&[]));
        assert_eq!(
            Identity::from_snapshot(&snapshot, &TAGS, CollectionKind::Calendar),
            None
        );
    }

    proptest! {
        #[test]
        fn content_key_fallback_is_hex(bytes in proptest::collection::vec(any::<u8>(), 1..48)) {
            let snapshot = PropertySnapshot::new().with(PropTag::CONTENT_KEY, key(&bytes));
            let identity = Identity::from_snapshot(&snapshot, &TAGS, CollectionKind::Calendar).unwrap();
            prop_assert_eq!(identity.object_id().into_string(), hex::encode(&bytes));
        }

        #[test]
        fn external_ref_always_beats_content_key(
            id in "[a-zA-Z0-9@.-]{1,40}",
            bytes in proptest::collection::vec(any::<u8>(), 1..48),
        ) {
            let snapshot = PropertySnapshot::new()
                .with(TAGS.external_ref, PropValue::String(id.clone()))
                .with(PropTag::CONTENT_KEY, key(&bytes));
            for kind in [CollectionKind::Calendar, CollectionKind::AddressBook] {
                let identity = Identity::from_snapshot(&snapshot, &TAGS, kind).unwrap();
                let object_id = identity.object_id();
                prop_assert_eq!(object_id.as_str(), id.as_str());
            }
        }
    }
}
