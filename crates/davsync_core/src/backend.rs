//! Backing groupware store abstraction.
//!
//! The sync core never talks to a concrete groupware server. Everything it
//! needs is expressed through [`GroupwareStore`], the incremental change
//! feed it hands out ([`ChangeFeedSession`]) and the visitor the feed
//! reports to ([`ChangeSink`]).

use crate::error::CoreResult;
use crate::property::{NamedPropertyTags, PropTag, PropertySnapshot, Restriction};
use crate::types::{CollectionId, FolderHandle, InternalKey, MessageHandle};

/// Receives changes from a [`ChangeFeedSession`].
pub trait ChangeSink {
    /// A message was created (`is_new`) or modified since the session's
    /// state. `snapshot` holds at least the identity properties.
    fn on_add(
        &mut self,
        key: &InternalKey,
        is_new: bool,
        snapshot: &PropertySnapshot,
    ) -> CoreResult<()>;

    /// Messages were deleted or moved out of the folder.
    fn on_delete(&mut self, keys: &[InternalKey]) -> CoreResult<()>;
}

/// An incremental change feed over one folder.
///
/// The session is configured once with an opaque state and a batch bound,
/// then driven step by step until it reports exhaustion. The state it
/// captures afterwards resumes the feed right after the last change that
/// was delivered.
pub trait ChangeFeedSession: Send {
    /// Positions the feed after `state`, delivering at most `batch_limit`
    /// changes in total.
    ///
    /// # Errors
    ///
    /// Returns an error if the state is not one this store produced.
    fn configure(&mut self, state: &[u8], batch_limit: u32) -> CoreResult<()>;

    /// Delivers the next step of changes to `sink`.
    ///
    /// Returns `true` while more steps remain within the batch bound.
    ///
    /// # Errors
    ///
    /// Returns backing store faults and errors raised by the sink.
    fn drive(&mut self, sink: &mut dyn ChangeSink) -> CoreResult<bool>;

    /// Total number of changes between the configured state and now,
    /// regardless of the batch bound.
    fn pending_count(&self) -> u32;

    /// The state after the last delivered change.
    ///
    /// # Errors
    ///
    /// Returns an error if the session was never configured.
    fn capture_state(&self) -> CoreResult<Vec<u8>>;
}

/// The backing groupware store.
///
/// # Implementors
///
/// - [`crate::MemoryGroupwareStore`] - For tests and demos
pub trait GroupwareStore: Send + Sync {
    /// Opens the folder backing `collection`.
    ///
    /// # Errors
    ///
    /// Returns `CollectionNotFound` for unknown collections and
    /// `InvalidCollectionId` for malformed ids.
    fn open_folder(&self, collection: &CollectionId) -> CoreResult<FolderHandle>;

    /// Maps the named properties used for identity to this store's tags.
    fn resolve_named_properties(&self, folder: &FolderHandle) -> CoreResult<NamedPropertyTags>;

    /// Reads the listed properties of a message. Missing properties are
    /// absent from the snapshot.
    fn read_properties(
        &self,
        folder: &FolderHandle,
        message: &MessageHandle,
        tags: &[PropTag],
    ) -> CoreResult<PropertySnapshot>;

    /// Writes properties to a message.
    fn write_properties(
        &self,
        folder: &FolderHandle,
        message: &MessageHandle,
        values: &PropertySnapshot,
    ) -> CoreResult<()>;

    /// Creates an empty message in the folder.
    fn create_message(&self, folder: &FolderHandle) -> CoreResult<MessageHandle>;

    /// Opens a message by its content key.
    fn open_by_content_key(
        &self,
        folder: &FolderHandle,
        key: &InternalKey,
    ) -> CoreResult<Option<MessageHandle>>;

    /// Returns every message matching `restriction`, in store order.
    fn find_messages(
        &self,
        folder: &FolderHandle,
        restriction: &Restriction,
    ) -> CoreResult<Vec<MessageHandle>>;

    /// Opens a new change feed session over the folder.
    fn open_change_feed(&self, folder: &FolderHandle) -> CoreResult<Box<dyn ChangeFeedSession>>;
}
