//! Integration tests for sync exchanges over the in-memory groupware store.

use davsync_core::{
    CollectionId, CollectionKind, FeedFault, InternalKey, MemoryGroupwareStore, PropValue,
    PropertySnapshot,
};
use davsync_engine::{SyncConfig, SyncCoordinator, SyncError, SyncOutcome};
use davsync_store::{CursorStore, InMemoryCursorStore, SqliteCursorStore};
use proptest::prelude::*;
use std::sync::Arc;
use tempfile::tempdir;

fn calendar(store: &MemoryGroupwareStore, id: &str) -> CollectionId {
    let collection = CollectionId::new(id);
    store
        .create_folder(&collection, CollectionKind::Calendar)
        .unwrap();
    collection
}

fn coordinator<C: CursorStore>(
    store: &Arc<MemoryGroupwareStore>,
    cursors: C,
) -> SyncCoordinator<MemoryGroupwareStore, C> {
    SyncCoordinator::new(SyncConfig::default(), Arc::clone(store), Arc::new(cursors))
}

fn plain_item() -> PropertySnapshot {
    PropertySnapshot::new()
}

#[test]
fn add_then_delete_scenario() {
    let store = Arc::new(MemoryGroupwareStore::new());
    let collection = calendar(&store, "alice:AABB");
    let sync = coordinator(&store, InMemoryCursorStore::new());

    // Initial sync of an empty folder
    let first = sync.sync(&collection, None, None).unwrap();
    let t1 = first.sync_token;
    assert!(first.added.is_empty() && first.modified.is_empty() && first.deleted.is_empty());
    let t1_state = sync.cursors().get_cursor(collection.as_str(), &t1).unwrap();

    // A client creates ev-1
    let message = sync.resolver().create_message(&collection, "ev-1").unwrap();
    let second = sync.sync(&collection, Some(&t1), None).unwrap();
    let t2 = second.sync_token;
    assert_ne!(t2, t1);
    assert_eq!(second.added, vec!["ev-1.ics"]);
    assert!(second.modified.is_empty());
    assert!(second.deleted.is_empty());

    // ev-1 is deleted in the store
    let key = InternalKey::new(message.as_bytes());
    assert!(store.delete(&collection, &key).unwrap());
    let third = sync.sync(&collection, Some(&t2), None).unwrap();
    assert_ne!(third.sync_token, t2);
    assert_eq!(third.deleted, vec!["ev-1.ics"]);
    assert!(third.added.is_empty());

    // Every token still resolves to its own cursor
    let replay = sync.sync(&collection, Some(&t1), None).unwrap();
    assert!(replay.is_empty());
    assert_eq!(replay.sync_token, t1);
    assert_eq!(
        sync.cursors().get_cursor(collection.as_str(), &t1).unwrap(),
        t1_state
    );
}

#[test]
fn content_key_identity_round_trip() {
    let store = Arc::new(MemoryGroupwareStore::new());
    let collection = calendar(&store, "alice:AABB");
    let sync = coordinator(&store, InMemoryCursorStore::new());

    let key = store.insert(&collection, plain_item()).unwrap();
    let delta = sync.sync(&collection, None, None).unwrap();
    assert_eq!(delta.added, vec![format!("{}.ics", key.to_hex())]);

    // The resource name leads back to the message
    let object_id = davsync_core::object_id_from_uri(&delta.added[0], ".ics");
    let found = sync.resolver().find_message(&collection, object_id).unwrap();
    assert_eq!(found.map(|m| m.as_bytes().to_vec()), Some(key.as_bytes().to_vec()));
}

#[test]
fn deletion_without_alias_reports_content_key() {
    let store = Arc::new(MemoryGroupwareStore::new());
    let collection = calendar(&store, "alice:AABB");
    let key = store
        .insert(
            &collection,
            PropertySnapshot::new().with(
                MemoryGroupwareStore::EXTERNAL_REF_TAG,
                PropValue::String("known-only-to-a".into()),
            ),
        )
        .unwrap();

    let a = coordinator(&store, InMemoryCursorStore::new());
    let t1 = a.sync(&collection, None, None).unwrap().sync_token;

    // A second coordinator that has the cursor but never saw the alias
    let b_cursors = InMemoryCursorStore::new();
    let state = a
        .cursors()
        .get_cursor(collection.as_str(), &t1)
        .unwrap()
        .unwrap();
    b_cursors.put_cursor(collection.as_str(), &t1, &state).unwrap();
    let b = coordinator(&store, b_cursors);

    store.delete(&collection, &key).unwrap();
    let delta = b.sync(&collection, Some(&t1), None).unwrap();
    assert_eq!(delta.deleted, vec![format!("{}.ics", key.to_hex())]);

    // The coordinator that recorded the alias reports the client's name
    let delta = a.sync(&collection, Some(&t1), None).unwrap();
    assert_eq!(delta.deleted, vec!["known-only-to-a.ics"]);
}

#[test]
fn partial_sync_reports_unseen_items_as_added() {
    let store = Arc::new(MemoryGroupwareStore::new());
    let collection = calendar(&store, "alice:AABB");
    let sync = coordinator(&store, InMemoryCursorStore::new());
    let t1 = sync.sync(&collection, None, None).unwrap().sync_token;

    let a = sync.resolver().create_message(&collection, "a").unwrap();
    sync.resolver().create_message(&collection, "b").unwrap();
    let a = InternalKey::new(a.as_bytes());
    store.update(&collection, &a, &plain_item()).unwrap();

    let first = sync.sync(&collection, Some(&t1), Some(1)).unwrap();
    assert_eq!(first.added, vec!["b.ics"]);
    assert!(first.has_more);

    let second = sync
        .sync(&collection, Some(&first.sync_token), Some(1))
        .unwrap();
    assert_eq!(second.added, vec!["a.ics"]);
    assert!(second.modified.is_empty());
    assert!(!second.has_more);
}

#[test]
fn partial_sync_drains_in_batches() {
    let store = Arc::new(MemoryGroupwareStore::new());
    let collection = calendar(&store, "alice:AABB");
    let sync = coordinator(&store, InMemoryCursorStore::new());
    let t1 = sync.sync(&collection, None, None).unwrap().sync_token;

    for i in 0..5 {
        sync.resolver()
            .create_message(&collection, &format!("ev-{i}"))
            .unwrap();
    }

    let first = sync.sync(&collection, Some(&t1), Some(2)).unwrap();
    assert_eq!(first.added, vec!["ev-0.ics", "ev-1.ics"]);
    assert!(first.has_more);

    let second = sync
        .sync(&collection, Some(&first.sync_token), Some(2))
        .unwrap();
    assert_eq!(second.added, vec!["ev-2.ics", "ev-3.ics"]);
    assert!(second.has_more);

    let third = sync
        .sync(&collection, Some(&second.sync_token), Some(2))
        .unwrap();
    assert_eq!(third.added, vec!["ev-4.ics"]);
    assert!(!third.has_more);

    let done = sync
        .sync(&collection, Some(&third.sync_token), Some(2))
        .unwrap();
    assert!(done.is_empty());
    assert_eq!(done.sync_token, third.sync_token);
}

#[test]
fn batch_limit_is_capped_by_config() {
    let store = Arc::new(MemoryGroupwareStore::new());
    let collection = calendar(&store, "alice:AABB");
    let sync = SyncCoordinator::new(
        SyncConfig::default().with_max_batch_size(3),
        Arc::clone(&store),
        Arc::new(InMemoryCursorStore::new()),
    );
    for _ in 0..4 {
        store.insert(&collection, plain_item()).unwrap();
    }

    let delta = sync.sync(&collection, None, Some(100)).unwrap();
    assert_eq!(delta.added.len(), 3);
    assert!(delta.has_more);
}

#[test]
fn failed_drive_keeps_the_old_token() {
    let store = Arc::new(MemoryGroupwareStore::new());
    let collection = calendar(&store, "alice:AABB");
    let sync = coordinator(&store, InMemoryCursorStore::new());
    let t1 = sync.sync(&collection, None, None).unwrap().sync_token;
    let cursors_before = sync.cursors().stats().unwrap().cursors;

    sync.resolver().create_message(&collection, "ev-1").unwrap();
    store.fail_feed(FeedFault::Drive);

    let err = sync.sync(&collection, Some(&t1), None).unwrap_err();
    assert!(matches!(err, SyncError::BackingStore(_)));
    assert_eq!(err.outcome(), SyncOutcome::ServerError);
    assert_eq!(sync.cursors().stats().unwrap().cursors, cursors_before);

    store.clear_faults();
    let delta = sync.sync(&collection, Some(&t1), None).unwrap();
    assert_eq!(delta.added, vec!["ev-1.ics"]);
}

#[test]
fn unknown_token_requires_resync() {
    let store = Arc::new(MemoryGroupwareStore::new());
    let collection = calendar(&store, "alice:AABB");
    let sync = coordinator(&store, InMemoryCursorStore::new());

    let err = sync.sync(&collection, Some("T-unknown"), None).unwrap_err();
    assert!(matches!(err, SyncError::ExpiredToken { .. }));
    assert_eq!(err.outcome(), SyncOutcome::ResyncRequired);
    assert!(err.is_client_error());
}

#[test]
fn moved_item_keeps_external_ref() {
    let store = Arc::new(MemoryGroupwareStore::new());
    let home = calendar(&store, "alice:AABB");
    let work = calendar(&store, "alice:CCDD");
    let sync = coordinator(&store, InMemoryCursorStore::new());

    let message = sync.resolver().create_message(&home, "ev-9").unwrap();
    let home_token = sync.sync(&home, None, None).unwrap().sync_token;
    let work_token = sync.sync(&work, None, None).unwrap().sync_token;

    let old_key = InternalKey::new(message.as_bytes());
    let new_key = store.move_message(&home, &old_key, &work).unwrap();
    assert_ne!(old_key, new_key);

    let home_delta = sync.sync(&home, Some(&home_token), None).unwrap();
    assert_eq!(home_delta.deleted, vec!["ev-9.ics"]);

    let work_delta = sync.sync(&work, Some(&work_token), None).unwrap();
    assert_eq!(work_delta.added, vec!["ev-9.ics"]);

    let found = sync.resolver().find_message(&work, "ev-9").unwrap().unwrap();
    assert_eq!(
        sync.resolver().resolve_object_id(&work, &found).unwrap().as_str(),
        "ev-9"
    );
    assert_eq!(sync.resolver().find_message(&home, "ev-9").unwrap(), None);
}

#[test]
fn address_books_use_vcf() {
    let store = Arc::new(MemoryGroupwareStore::new());
    let contacts = CollectionId::new("alice:EEFF");
    store
        .create_folder(&contacts, CollectionKind::AddressBook)
        .unwrap();
    let sync = coordinator(&store, InMemoryCursorStore::new());

    sync.resolver().create_message(&contacts, "card-1").unwrap();
    let delta = sync.sync(&contacts, None, None).unwrap();
    assert_eq!(delta.added, vec!["card-1.vcf"]);
}

#[test]
fn sqlite_cursors_survive_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("syncstate.db");
    let store = Arc::new(MemoryGroupwareStore::new());
    let collection = calendar(&store, "alice:AABB");

    let (t2, message) = {
        let sync = coordinator(&store, SqliteCursorStore::open_path(&path).unwrap());
        let t1 = sync.sync(&collection, None, None).unwrap().sync_token;
        let message = sync.resolver().create_message(&collection, "ev-1").unwrap();
        let delta = sync.sync(&collection, Some(&t1), None).unwrap();
        assert_eq!(delta.added, vec!["ev-1.ics"]);
        (delta.sync_token, message)
    };

    store
        .delete(&collection, &InternalKey::new(message.as_bytes()))
        .unwrap();

    let sync = coordinator(&store, SqliteCursorStore::open_path(&path).unwrap());
    let delta = sync.sync(&collection, Some(&t2), None).unwrap();
    assert_eq!(delta.deleted, vec!["ev-1.ics"]);

    let err = sync.sync(&collection, Some("T-unknown"), None).unwrap_err();
    assert!(matches!(err, SyncError::ExpiredToken { .. }));
}

#[test]
fn coordinator_is_shared_across_threads() {
    let store = Arc::new(MemoryGroupwareStore::new());
    let collection = calendar(&store, "alice:AABB");
    for _ in 0..3 {
        store.insert(&collection, plain_item()).unwrap();
    }
    let sync = Arc::new(coordinator(&store, InMemoryCursorStore::new()));

    let tokens: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let sync = Arc::clone(&sync);
                let collection = collection.clone();
                scope.spawn(move || {
                    let delta = sync.sync(&collection, None, None).unwrap();
                    assert_eq!(delta.added.len(), 3);
                    delta.sync_token
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for token in &tokens {
        assert!(sync
            .cursors()
            .get_cursor(collection.as_str(), token)
            .unwrap()
            .is_some());
    }
    assert_eq!(sync.stats().exchanges_completed, 4);
}

proptest! {
    #[test]
    fn batches_deliver_every_change_once(items in 0usize..20, batch in 1u32..8) {
        let store = Arc::new(MemoryGroupwareStore::new());
        let collection = calendar(&store, "alice:AABB");
        let sync = coordinator(&store, InMemoryCursorStore::new());
        for _ in 0..items {
            store.insert(&collection, plain_item()).unwrap();
        }

        let mut seen = Vec::new();
        let mut token: Option<String> = None;
        let mut rounds = 0;
        loop {
            let delta = sync.sync(&collection, token.as_deref(), Some(batch)).unwrap();
            prop_assert!(delta.total() <= batch as usize);
            seen.extend(delta.added);
            token = Some(delta.sync_token);
            rounds += 1;
            if !delta.has_more {
                break;
            }
        }

        let expected_rounds = items.div_ceil(batch as usize).max(1);
        prop_assert_eq!(rounds, expected_rounds);
        let mut unique = seen.clone();
        unique.sort();
        unique.dedup();
        prop_assert_eq!(unique.len(), items);
        prop_assert_eq!(seen.len(), items);
    }
}
