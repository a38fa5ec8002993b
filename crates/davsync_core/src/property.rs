//! Property tags, values and search restrictions.

use std::collections::BTreeMap;
use std::fmt;

/// Identifies a property of a backing store message.
///
/// The upper 16 bits are the property id, the lower 16 bits the value type,
/// as in the store's native tag layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropTag(pub u32);

impl PropTag {
    /// The per-item content key (binary).
    pub const CONTENT_KEY: PropTag = PropTag(0x65E0_0102);

    /// Type code for 8-bit string values.
    pub const TYPE_STRING8: u16 = 0x001E;
    /// Type code for unicode string values.
    pub const TYPE_UNICODE: u16 = 0x001F;
    /// Type code for binary values.
    pub const TYPE_BINARY: u16 = 0x0102;

    /// Builds a tag from a property id and a type code.
    pub const fn new(id: u16, prop_type: u16) -> Self {
        PropTag(((id as u32) << 16) | prop_type as u32)
    }

    /// The property id part.
    pub const fn id(self) -> u16 {
        (self.0 >> 16) as u16
    }

    /// The value type part.
    pub const fn prop_type(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    /// Returns the same property id with another value type.
    ///
    /// Used to query a string property through its binary representation.
    pub const fn with_type(self, prop_type: u16) -> Self {
        Self::new(self.id(), prop_type)
    }
}

impl fmt::Display for PropTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

/// A property value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropValue {
    /// Text value.
    String(String),
    /// Binary value.
    Binary(Vec<u8>),
}

impl PropValue {
    /// Returns true for an empty string or empty binary.
    pub fn is_empty(&self) -> bool {
        match self {
            PropValue::String(s) => s.is_empty(),
            PropValue::Binary(b) => b.is_empty(),
        }
    }

    /// Raw bytes of the value; strings compare by their UTF-8 encoding.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            PropValue::String(s) => s.as_bytes(),
            PropValue::Binary(b) => b,
        }
    }
}

/// The properties read from one message, ordered by tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertySnapshot(BTreeMap<PropTag, PropValue>);

impl PropertySnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, tag: PropTag, value: PropValue) -> Self {
        self.0.insert(tag, value);
        self
    }

    /// Sets a property, replacing any previous value.
    pub fn set(&mut self, tag: PropTag, value: PropValue) {
        self.0.insert(tag, value);
    }

    /// Looks up a property.
    pub fn get(&self, tag: PropTag) -> Option<&PropValue> {
        self.0.get(&tag)
    }

    /// Copies the listed properties into a new snapshot.
    #[must_use]
    pub fn project(&self, tags: &[PropTag]) -> Self {
        Self(
            tags.iter()
                .filter_map(|tag| self.0.get(tag).map(|v| (*tag, v.clone())))
                .collect(),
        )
    }

    /// Merges `other` into this snapshot; values in `other` win.
    pub fn merge(&mut self, other: &PropertySnapshot) {
        for (tag, value) in other.iter() {
            self.0.insert(tag, value.clone());
        }
    }

    /// Iterates over all properties in tag order.
    pub fn iter(&self) -> impl Iterator<Item = (PropTag, &PropValue)> {
        self.0.iter().map(|(tag, value)| (*tag, value))
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the snapshot holds no properties.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(PropTag, PropValue)> for PropertySnapshot {
    fn from_iter<I: IntoIterator<Item = (PropTag, PropValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A named property: a property set GUID plus a numeric id, mapped to a
/// store-specific [`PropTag`] at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NamedProperty {
    /// Property set GUID.
    pub set: &'static str,
    /// Numeric id within the set.
    pub id: u32,
    /// Value type code.
    pub prop_type: u16,
}

/// The external reference: the client-chosen identifier stamped on
/// creation.
pub const EXTERNAL_REF: NamedProperty = NamedProperty {
    set: "77536087-CB81-4DC9-9958-EA4C51BE3486",
    id: 0x0025,
    prop_type: PropTag::TYPE_STRING8,
};

/// The global object id of meeting items.
pub const GLOBAL_ID: NamedProperty = NamedProperty {
    set: "6ED8DA90-450B-101B-98DA-00AA003F1305",
    id: 0x0003,
    prop_type: PropTag::TYPE_BINARY,
};

/// Store-assigned tags for the named properties identity resolution reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamedPropertyTags {
    /// Tag of [`EXTERNAL_REF`].
    pub external_ref: PropTag,
    /// Tag of [`GLOBAL_ID`].
    pub global_id: PropTag,
}

impl NamedPropertyTags {
    /// The tags read when resolving an object's identity.
    pub fn identity_tags(&self) -> [PropTag; 3] {
        [self.external_ref, self.global_id, PropTag::CONTENT_KEY]
    }
}

/// A property search restriction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Restriction {
    /// Property equals value. The value type decides how the property is
    /// compared: a string restriction on a binary property never matches.
    Eq(PropTag, PropValue),
    /// Any of the nested restrictions match.
    Or(Vec<Restriction>),
}

impl Restriction {
    /// Evaluates the restriction against a snapshot.
    ///
    /// Tags are compared by property id; a binary restriction matches a
    /// string property with the same bytes.
    pub fn matches(&self, snapshot: &PropertySnapshot) -> bool {
        match self {
            Restriction::Eq(tag, expected) => snapshot
                .iter()
                .filter(|(t, _)| t.id() == tag.id())
                .any(|(_, actual)| match (expected, actual) {
                    (PropValue::String(e), PropValue::String(a)) => e == a,
                    (PropValue::Binary(e), a) => e.as_slice() == a.as_bytes(),
                    (PropValue::String(_), PropValue::Binary(_)) => false,
                }),
            Restriction::Or(alternatives) => alternatives.iter().any(|r| r.matches(snapshot)),
        }
    }
}
