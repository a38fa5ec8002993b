//! Cursor and alias lookups.

use davsync_core::InternalKey;
use davsync_engine::INITIAL_STATE;
use davsync_store::{CursorStore, StoreConfig};

/// Returns the hex-encoded state stored under `label`.
pub fn cursor_state(
    store: &dyn CursorStore,
    collection: &str,
    label: &str,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    Ok(store.get_cursor(collection, label)?.map(|state| {
        if state == INITIAL_STATE {
            format!("{} (initial)", hex::encode(&state))
        } else {
            hex::encode(&state)
        }
    }))
}

/// Returns the object id remembered for a hex content key.
///
/// Keys are matched case-insensitively.
pub fn alias(
    store: &dyn CursorStore,
    collection: &str,
    key: &str,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let key = InternalKey::from_hex(key).ok_or_else(|| format!("'{key}' is not a hex key"))?;
    Ok(store.get_alias(collection, &key.to_hex())?)
}

/// Runs the cursor command.
pub fn run_cursor(
    config: &StoreConfig,
    collection: &str,
    label: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store(config)?;
    match cursor_state(&store, collection, label)? {
        Some(state) => println!("{state}"),
        None => println!("not found"),
    }
    Ok(())
}

/// Runs the alias command.
pub fn run_alias(
    config: &StoreConfig,
    collection: &str,
    key: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store(config)?;
    match alias(&store, collection, key)? {
        Some(object_id) => println!("{object_id}"),
        None => println!("not found"),
    }
    Ok(())
}
