//! Init command implementation.

use davsync_store::{CursorStore, StoreConfig};

/// Runs the init command.
pub fn run(config: &StoreConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store(config)?;
    let stats = store.stats()?;
    println!("Sync database ready at {}", config.url);
    println!("  {} cursors, {} aliases", stats.cursors, stats.aliases);
    Ok(())
}
