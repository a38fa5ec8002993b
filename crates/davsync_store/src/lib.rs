//! # davsync Store
//!
//! Durable storage for sync cursors and identity aliases.
//!
//! This crate is the lowest layer of davsync. It knows nothing about
//! groupware folders, messages or property tags: collections, labels and
//! internal keys are plain strings, and cursor states are opaque bytes.
//!
//! ## Tables
//!
//! - `cursors` - (label, collection) → hex-encoded cursor state
//! - `aliases` - (internal key, collection) → externally visible object id
//!
//! Both tables are created idempotently on first use.
//!
//! ## Available Stores
//!
//! - [`SqliteCursorStore`] - Persistent storage in an embedded SQLite database
//! - [`InMemoryCursorStore`] - For testing and ephemeral deployments
//!
//! ## Example
//!
//! ```rust
//! use davsync_store::{CursorStore, InMemoryCursorStore};
//!
//! let store = InMemoryCursorStore::new();
//! store.put_cursor("alice:AABB", "T1", &[0u8; 8]).unwrap();
//! assert_eq!(store.get_cursor("alice:AABB", "T1").unwrap(), Some(vec![0u8; 8]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod config;
mod error;
mod memory;
mod sqlite;

pub use backend::{CursorStore, StoreStats};
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryCursorStore;
pub use sqlite::SqliteCursorStore;
