//! Translation of change feed callbacks into client-visible resource names.

use davsync_core::{
    ChangeSink, CoreError, CoreResult, FolderHandle, Identity, InternalKey, NamedPropertyTags,
    PropertySnapshot,
};
use davsync_store::CursorStore;
use tracing::trace;

/// Lifecycle of a [`ChangeImporter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportState {
    /// No change received yet.
    Idle,
    /// Receiving changes.
    Importing,
    /// The batch is full or the feed is exhausted; no more changes are
    /// accepted.
    Done,
}

impl ImportState {
    /// Returns true once the importer accepts no more changes.
    pub fn is_finished(&self) -> bool {
        matches!(self, ImportState::Done)
    }
}

/// The resource names collected by one import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportedChanges {
    /// Resources created since the previous state.
    pub added: Vec<String>,
    /// Resources modified since the previous state.
    pub modified: Vec<String>,
    /// Resources deleted or moved away since the previous state.
    pub deleted: Vec<String>,
}

impl ImportedChanges {
    /// Number of changes across all three lists.
    pub fn total(&self) -> usize {
        self.added.len() + self.modified.len() + self.deleted.len()
    }

    /// Returns true if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Consumes one change feed session on behalf of a sync exchange.
///
/// Every add or modify records the object's identity alias so that a later
/// deletion, when the object's properties are gone, can still be reported
/// under the name the client knows. Lists keep feed order and are not
/// deduplicated.
pub struct ChangeImporter<'a, C: CursorStore + ?Sized> {
    cursors: &'a C,
    folder: &'a FolderHandle,
    tags: NamedPropertyTags,
    limit: usize,
    state: ImportState,
    changes: ImportedChanges,
}

impl<'a, C: CursorStore + ?Sized> ChangeImporter<'a, C> {
    /// Creates an importer for `folder` accepting up to `limit` changes.
    /// Deletion runs delivered in one callback are never split.
    pub fn new(cursors: &'a C, folder: &'a FolderHandle, tags: NamedPropertyTags, limit: u32) -> Self {
        Self {
            cursors,
            folder,
            tags,
            limit: limit as usize,
            state: ImportState::Idle,
            changes: ImportedChanges::default(),
        }
    }

    /// Current state.
    pub fn state(&self) -> ImportState {
        self.state
    }

    /// Number of changes collected so far.
    pub fn total(&self) -> usize {
        self.changes.total()
    }

    /// Marks the import complete.
    pub fn finish(&mut self) {
        self.state = ImportState::Done;
    }

    /// Consumes the importer and returns the collected changes.
    pub fn into_changes(self) -> ImportedChanges {
        self.changes
    }

    fn begin(&mut self) -> CoreResult<()> {
        match self.state {
            ImportState::Done => Err(CoreError::invalid_operation(
                "change received after import finished",
            )),
            ImportState::Idle | ImportState::Importing => {
                self.state = ImportState::Importing;
                Ok(())
            }
        }
    }

    fn check_limit(&mut self) {
        if self.total() >= self.limit {
            self.state = ImportState::Done;
        }
    }

    fn collection(&self) -> &str {
        self.folder.collection.as_str()
    }

    fn uri(&self, object_id: &str) -> String {
        format!("{object_id}{}", self.folder.kind.extension())
    }
}

impl<C: CursorStore + ?Sized> ChangeSink for ChangeImporter<'_, C> {
    fn on_add(
        &mut self,
        key: &InternalKey,
        is_new: bool,
        snapshot: &PropertySnapshot,
    ) -> CoreResult<()> {
        self.begin()?;

        let identity = Identity::from_snapshot(snapshot, &self.tags, self.folder.kind)
            .ok_or(CoreError::IndeterminateIdentity)?;
        let object_id = identity.object_id();
        self.cursors
            .remember_alias(self.collection(), &key.to_hex(), object_id.as_str())?;

        let uri = self.uri(object_id.as_str());
        trace!("{} {} ({})", if is_new { "Added" } else { "Modified" }, uri, key);
        if is_new {
            self.changes.added.push(uri);
        } else {
            self.changes.modified.push(uri);
        }

        self.check_limit();
        Ok(())
    }

    fn on_delete(&mut self, keys: &[InternalKey]) -> CoreResult<()> {
        self.begin()?;

        for key in keys {
            let hex_key = key.to_hex();
            let object_id = match self.cursors.get_alias(self.collection(), &hex_key)? {
                Some(alias) => alias,
                None => {
                    trace!("No alias for deleted {}, reporting its content key", hex_key);
                    hex_key
                }
            };
            let uri = self.uri(&object_id);
            trace!("Deleted {} ({})", uri, key);
            self.changes.deleted.push(uri);
        }

        self.check_limit();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use davsync_core::{CollectionId, CollectionKind, PropTag, PropValue};
    use davsync_store::{InMemoryCursorStore, StoreError};

    const TAGS: NamedPropertyTags = NamedPropertyTags {
        external_ref: PropTag(0x8025_001E),
        global_id: PropTag(0x8003_0102),
    };

    fn folder(kind: CollectionKind) -> FolderHandle {
        FolderHandle {
            collection: CollectionId::new("alice:AABB"),
            key: vec![0xAA, 0xBB],
            kind,
        }
    }

    fn item(external_ref: Option<&str>, key: &InternalKey) -> PropertySnapshot {
        let snapshot = PropertySnapshot::new()
            .with(PropTag::CONTENT_KEY, PropValue::Binary(key.as_bytes().to_vec()));
        match external_ref {
            Some(id) => snapshot.with(TAGS.external_ref, PropValue::String(id.into())),
            None => snapshot,
        }
    }

    #[test]
    fn add_records_alias_and_uri() {
        let cursors = InMemoryCursorStore::new();
        let folder = folder(CollectionKind::Calendar);
        let mut importer = ChangeImporter::new(&cursors, &folder, TAGS, 10);
        assert_eq!(importer.state(), ImportState::Idle);

        let key = InternalKey::new(vec![0x0a, 0x0b]);
        importer.on_add(&key, true, &item(Some("ev-1"), &key)).unwrap();
        assert_eq!(importer.state(), ImportState::Importing);

        let other = InternalKey::new(vec![0x0c]);
        importer.on_add(&other, false, &item(None, &other)).unwrap();

        assert_eq!(
            cursors.get_alias("alice:AABB", "0a0b").unwrap().as_deref(),
            Some("ev-1")
        );
        let changes = importer.into_changes();
        assert_eq!(changes.added, vec!["ev-1.ics"]);
        assert_eq!(changes.modified, vec!["0c.ics"]);
        assert_eq!(changes.total(), 2);
    }

    #[test]
    fn delete_uses_alias_or_hex_key() {
        let cursors = InMemoryCursorStore::new();
        cursors.remember_alias("alice:AABB", "0a0b", "card-1").unwrap();
        let folder = folder(CollectionKind::AddressBook);
        let mut importer = ChangeImporter::new(&cursors, &folder, TAGS, 10);

        importer
            .on_delete(&[InternalKey::new(vec![0x0a, 0x0b]), InternalKey::new(vec![0xff])])
            .unwrap();

        assert_eq!(importer.into_changes().deleted, vec!["card-1.vcf", "ff.vcf"]);
    }

    #[test]
    fn delete_run_crosses_the_limit() {
        let cursors = InMemoryCursorStore::new();
        let folder = folder(CollectionKind::Calendar);
        let mut importer = ChangeImporter::new(&cursors, &folder, TAGS, 2);

        let keys: Vec<_> = (0u8..3).map(|b| InternalKey::new(vec![b])).collect();
        importer.on_delete(&keys).unwrap();

        assert_eq!(importer.state(), ImportState::Done);
        assert_eq!(importer.total(), 3);
    }

    #[test]
    fn limit_finishes_the_import() {
        let cursors = InMemoryCursorStore::new();
        let folder = folder(CollectionKind::Calendar);
        let mut importer = ChangeImporter::new(&cursors, &folder, TAGS, 1);

        let key = InternalKey::new(vec![1]);
        importer.on_add(&key, true, &item(None, &key)).unwrap();
        assert!(importer.state().is_finished());

        assert!(matches!(
            importer.on_add(&key, false, &item(None, &key)),
            Err(CoreError::InvalidOperation { .. })
        ));
        assert!(matches!(
            importer.on_delete(&[key]),
            Err(CoreError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn finish_from_idle() {
        let cursors = InMemoryCursorStore::new();
        let folder = folder(CollectionKind::Calendar);
        let mut importer = ChangeImporter::new(&cursors, &folder, TAGS, 10);
        importer.finish();
        assert_eq!(importer.state(), ImportState::Done);
        assert!(importer.into_changes().is_empty());
    }

    #[test]
    fn duplicates_pass_through() {
        let cursors = InMemoryCursorStore::new();
        let folder = folder(CollectionKind::Calendar);
        let mut importer = ChangeImporter::new(&cursors, &folder, TAGS, 10);

        let key = InternalKey::new(vec![7]);
        importer.on_add(&key, false, &item(Some("x"), &key)).unwrap();
        importer.on_delete(std::slice::from_ref(&key)).unwrap();

        let changes = importer.into_changes();
        assert_eq!(changes.modified, vec!["x.ics"]);
        assert_eq!(changes.deleted, vec!["x.ics"]);
    }

    #[test]
    fn missing_content_key_is_indeterminate() {
        let cursors = InMemoryCursorStore::new();
        let folder = folder(CollectionKind::Calendar);
        let mut importer = ChangeImporter::new(&cursors, &folder, TAGS, 10);

        assert!(matches!(
            importer.on_add(&InternalKey::new(vec![1]), true, &PropertySnapshot::new()),
            Err(CoreError::IndeterminateIdentity)
        ));
    }

    #[test]
    fn persistence_failures_propagate() {
        let cursors = InMemoryCursorStore::new();
        cursors.close();
        let folder = folder(CollectionKind::Calendar);
        let mut importer = ChangeImporter::new(&cursors, &folder, TAGS, 10);

        let key = InternalKey::new(vec![1]);
        assert!(matches!(
            importer.on_add(&key, true, &item(None, &key)),
            Err(CoreError::Persistence(StoreError::Closed))
        ));
    }
}
