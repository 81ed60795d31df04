//! Storage abstraction for conversation state and skipped message keys
//!
//! Trait-based abstraction for persisting [`Conversation`] snapshots and the
//! cache of message keys derived ahead of delivery. The trait is synchronous
//! (no async) to keep the engine sans-IO and deterministic under test.

mod chaotic;
mod error;
mod memory;
mod redb;

pub use chaotic::ChaoticStorage;
pub use error::StorageError;
pub use memory::MemoryStorage;
use ratchet_crypto::MessageKey;

pub use self::redb::RedbStorage;
use crate::conversation::{Conversation, ConversationId};

/// Storage abstraction for conversations and cached message keys
///
/// Must be Clone (shared by engines and hosts), Send + Sync (thread-safe), and
/// synchronous. Implementations typically share internal state via Arc, so
/// clones access the same underlying storage.
///
/// # Panics
///
/// Implementations may panic if internal synchronization primitives are
/// poisoned (a thread panicked while holding a lock). Acceptable for
/// test/simulation code, but production implementations should handle poisoned
/// mutexes gracefully.
pub trait LocalDatasource: Clone + Send + Sync + 'static {
    /// Insert or fully overwrite a conversation.
    fn save_or_update_conversation(&self, conversation: &Conversation) -> Result<(), StorageError>;

    /// Load a conversation. `None` if it was never saved.
    fn get_conversation(&self, id: ConversationId) -> Result<Option<Conversation>, StorageError>;

    /// Cache a message key under `id` (see [`crate::message_key_id`]).
    ///
    /// Overwrites an existing entry with the same id.
    fn save_message_key(&self, id: &str, key: &MessageKey) -> Result<(), StorageError>;

    /// Atomically read and remove a cached message key.
    ///
    /// # Invariants
    ///
    /// - A key is returned at most once; a second pop for the same id yields
    ///   `None`
    fn pop_message_key(&self, id: &str) -> Result<Option<MessageKey>, StorageError>;
}
