//! # davsync Core
//!
//! Object identity and backing store contracts for davsync.
//!
//! A DAV client addresses calendar and address book entries by resource
//! name. The groupware store behind davsync addresses them by binary
//! content keys that change when an item moves between folders. This crate
//! bridges the two:
//!
//! - [`Identity`] derives a stable object id from an item's properties
//! - [`IdentityResolver`] maps ids to messages and back, caching the
//!   store's named property tags per collection
//! - [`GroupwareStore`], [`ChangeFeedSession`] and [`ChangeSink`] describe
//!   what davsync needs from the backing store
//!
//! ## Identity order
//!
//! An object id is taken from, in this order:
//!
//! 1. the external reference, the id a client chose when it created the item
//! 2. the global object id (calendars only)
//! 3. the hex-encoded content key
//!
//! ## Example
//!
//! ```rust
//! use davsync_core::{
//!     CollectionId, CollectionKind, IdentityResolver, MemoryGroupwareStore, MessageHandle,
//!     PropertySnapshot,
//! };
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryGroupwareStore::new());
//! let collection = CollectionId::new("alice:AABB");
//! store.create_folder(&collection, CollectionKind::AddressBook).unwrap();
//! let key = store.insert(&collection, PropertySnapshot::new()).unwrap();
//!
//! let resolver = IdentityResolver::new(store);
//! let id = resolver
//!     .resolve_object_id(&collection, &MessageHandle::new(key.as_bytes()))
//!     .unwrap();
//! assert_eq!(id.as_str(), key.to_hex());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod cache;
mod error;
pub mod global_id;
mod identity;
mod memory;
mod property;
mod resolver;
mod types;

pub use backend::{ChangeFeedSession, ChangeSink, GroupwareStore};
pub use cache::PropertyTagCache;
pub use error::{CoreError, CoreResult};
pub use identity::Identity;
pub use memory::{FeedFault, MemoryGroupwareStore};
pub use property::{
    NamedProperty, NamedPropertyTags, PropTag, PropValue, PropertySnapshot, Restriction,
    EXTERNAL_REF, GLOBAL_ID,
};
pub use resolver::IdentityResolver;
pub use types::{
    object_id_from_uri, CollectionId, CollectionKind, FolderHandle, InternalKey, MessageHandle,
    ObjectId,
};
