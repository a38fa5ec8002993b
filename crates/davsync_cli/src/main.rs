//! davsync CLI
//!
//! Command-line tools for the davsync cursor database.
//!
//! # Commands
//!
//! - `init` - Create the database schema
//! - `inspect` - Display row counts and the sync tokens of a collection
//! - `cursor` - Show the state stored under a sync token
//! - `alias` - Show the object id remembered for a content key

mod commands;
mod config;

use clap::{Parser, Subcommand};
use config::FileConfig;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// davsync cursor database tools.
#[derive(Parser)]
#[command(name = "davsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Database connection string (overrides the configuration file)
    #[arg(global = true, long)]
    db: Option<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema
    Init,

    /// Display database statistics
    Inspect {
        /// Also list the sync tokens of this collection
        #[arg(long)]
        collection: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show the cursor stored under a sync token
    Cursor {
        /// Collection id
        collection: String,
        /// Sync token
        label: String,
    },

    /// Show the object id remembered for a content key
    Alias {
        /// Collection id
        collection: String,
        /// Hex-encoded content key
        key: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = FileConfig::load(cli.config.as_deref())?.with_db_override(cli.db);
    debug!("Using {:?}", config);

    match cli.command {
        Commands::Init => {
            commands::init::run(&config.store)?;
        }
        Commands::Inspect { collection, format } => {
            commands::inspect::run(&config, collection.as_deref(), &format)?;
        }
        Commands::Cursor { collection, label } => {
            commands::lookup::run_cursor(&config.store, &collection, &label)?;
        }
        Commands::Alias { collection, key } => {
            commands::lookup::run_alias(&config.store, &collection, &key)?;
        }
        Commands::Version => {
            println!("davsync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
