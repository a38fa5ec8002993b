//! CLI command implementations.

pub mod init;
pub mod inspect;
pub mod lookup;

use davsync_store::{SqliteCursorStore, StoreConfig};

/// Opens the cursor database, creating the schema if needed.
pub fn open_store(config: &StoreConfig) -> Result<SqliteCursorStore, Box<dyn std::error::Error>> {
    Ok(SqliteCursorStore::open(config)?)
}
