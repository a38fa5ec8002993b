//! Per-collection cache of named property tags.

use crate::error::CoreResult;
use crate::property::NamedPropertyTags;
use crate::types::CollectionId;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Caches the tags a store assigned to the identity named properties.
///
/// Tags are resolved at most once per collection until the entry is
/// invalidated. Resolution runs outside the lock, so two racing misses
/// may both resolve; the later insert wins.
#[derive(Debug, Default)]
pub struct PropertyTagCache {
    entries: RwLock<HashMap<CollectionId, NamedPropertyTags>>,
}

impl PropertyTagCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached tags for `collection`, calling `resolve` on a miss.
    ///
    /// # Errors
    ///
    /// Propagates errors from `resolve`; nothing is cached in that case.
    pub fn get_or_resolve<F>(&self, collection: &CollectionId, resolve: F) -> CoreResult<NamedPropertyTags>
    where
        F: FnOnce() -> CoreResult<NamedPropertyTags>,
    {
        if let Some(tags) = self.entries.read().get(collection) {
            return Ok(*tags);
        }

        let tags = resolve()?;
        self.entries.write().insert(collection.clone(), tags);
        Ok(tags)
    }

    /// Drops the entry for `collection`. Returns true if one existed.
    pub fn invalidate(&self, collection: &CollectionId) -> bool {
        self.entries.write().remove(collection).is_some()
    }

    /// Number of cached collections.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::property::PropTag;
    use std::cell::Cell;

    const TAGS: NamedPropertyTags = NamedPropertyTags {
        external_ref: PropTag(0x8025_001E),
        global_id: PropTag(0x8003_0102),
    };

    #[test]
    fn resolves_once_until_invalidated() {
        let cache = PropertyTagCache::new();
        let calls = Cell::new(0);
        let collection = CollectionId::new("alice:AABB");
        let resolve = || {
            calls.set(calls.get() + 1);
            Ok(TAGS)
        };

        assert_eq!(cache.get_or_resolve(&collection, resolve).unwrap(), TAGS);
        assert_eq!(cache.get_or_resolve(&collection, resolve).unwrap(), TAGS);
        assert_eq!(calls.get(), 1);

        assert!(cache.invalidate(&collection));
        assert!(!cache.invalidate(&collection));
        cache.get_or_resolve(&collection, resolve).unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn errors_are_not_cached() {
        let cache = PropertyTagCache::new();
        let collection = CollectionId::new("alice:AABB");

        let failed = cache.get_or_resolve(&collection, || Err(CoreError::backend("offline")));
        assert!(failed.is_err());
        assert!(cache.is_empty());

        cache.get_or_resolve(&collection, || Ok(TAGS)).unwrap();
        assert_eq!(cache.len(), 1);
    }
}
