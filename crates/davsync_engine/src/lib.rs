//! # davsync Engine
//!
//! Incremental `sync-collection` exchanges for CalDAV and CardDAV
//! collections backed by a groupware store.
//!
//! This crate provides:
//! - [`SyncCoordinator`], which runs one exchange per client request
//! - [`ChangeImporter`], which turns change feed callbacks into resource
//!   names and records identity aliases
//! - [`SyncError`] and its mapping to protocol outcomes
//!
//! ## Exchange
//!
//! 1. Look up the cursor stored under the client's token (none for an
//!    initial sync)
//! 2. Drain the collection's change feed from that cursor, up to the
//!    batch bound
//! 3. Store the new cursor under a fresh token, or under the old one if
//!    nothing changed
//! 4. Answer with the added, modified and deleted resource names
//!
//! ## Key Invariants
//!
//! - A token always maps to the cursor stored under it
//! - A cursor is committed only after its batch was read completely
//! - An unknown token is a client error, never a server fault
//! - Deleted objects are reported under the name the client knew

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod coordinator;
mod error;
mod importer;

pub use config::SyncConfig;
pub use coordinator::{SyncCoordinator, SyncDelta, SyncStats, INITIAL_STATE};
pub use error::{SyncError, SyncOutcome, SyncResult};
pub use importer::{ChangeImporter, ImportState, ImportedChanges};
