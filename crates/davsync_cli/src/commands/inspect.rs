//! Inspect command implementation.

use crate::config::FileConfig;
use davsync_core::CollectionId;
use davsync_store::CursorStore;
use serde::Serialize;

/// Database inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Connection string.
    pub url: String,
    /// Number of stored cursors.
    pub cursors: u64,
    /// Number of remembered aliases.
    pub aliases: u64,
    /// Configured maximum batch size.
    pub max_batch_size: u32,
    /// Configured default batch size.
    pub default_batch_size: u32,
    /// Collection details (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<CollectionCursors>,
}

/// Cursor labels of a single collection.
#[derive(Debug, Serialize)]
pub struct CollectionCursors {
    /// Collection id.
    pub id: String,
    /// Principal part of the id, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,
    /// Sync tokens issued for the collection.
    pub labels: Vec<String>,
}

/// Gathers statistics from `store`.
pub fn collect(
    store: &dyn CursorStore,
    config: &FileConfig,
    collection: Option<&str>,
) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let stats = store.stats()?;

    let collection = match collection {
        Some(id) => {
            let id = CollectionId::new(id);
            id.folder_key()?;
            Some(CollectionCursors {
                labels: store.labels(id.as_str())?,
                principal: id.principal().map(str::to_string),
                id: id.to_string(),
            })
        }
        None => None,
    };

    Ok(InspectResult {
        url: config.store.url.clone(),
        cursors: stats.cursors,
        aliases: stats.aliases,
        max_batch_size: config.sync.max_batch_size,
        default_batch_size: config.sync.default_batch_size,
        collection,
    })
}

/// Runs the inspect command.
pub fn run(
    config: &FileConfig,
    collection: Option<&str>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store(&config.store)?;
    let result = collect(&store, config, collection)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Sync database: {}", result.url);
    println!();
    println!("Contents:");
    println!("  Cursors: {}", result.cursors);
    println!("  Aliases: {}", result.aliases);
    println!();
    println!("Batch limits:");
    println!("  Default: {}", result.default_batch_size);
    println!("  Maximum: {}", result.max_batch_size);

    if let Some(collection) = &result.collection {
        println!();
        println!("Collection {}:", collection.id);
        if let Some(principal) = &collection.principal {
            println!("  Principal: {principal}");
        }
        if collection.labels.is_empty() {
            println!("  No sync tokens issued");
        }
        for label in &collection.labels {
            println!("  {label}");
        }
    }
}
