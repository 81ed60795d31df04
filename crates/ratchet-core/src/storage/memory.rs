#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use ratchet_crypto::MessageKey;

use super::{LocalDatasource, StorageError};
use crate::conversation::{Conversation, ConversationId};

/// In-memory storage implementation for testing and simulation
///
/// All state is wrapped in Arc<Mutex<>> to allow Clone and concurrent access.
/// Thread-safe through Mutex, but uses `lock().expect()` which will panic if
/// the mutex is poisoned - acceptable for test code. All operations are O(1).
#[derive(Clone)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemoryStorageInner>>,
}

struct MemoryStorageInner {
    /// Latest snapshot per conversation
    conversations: HashMap<ConversationId, Conversation>,

    /// Skipped message keys by `"{conversationId} - {messageNumber}"`
    message_keys: HashMap<String, MessageKey>,
}

impl MemoryStorage {
    /// Create a new empty `MemoryStorage`
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryStorageInner {
                conversations: HashMap::new(),
                message_keys: HashMap::new(),
            })),
        }
    }

    /// Number of stored conversations.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned (a thread panicked while
    /// holding the lock). This is acceptable for test/simulation code.
    #[allow(clippy::expect_used)]
    pub fn conversation_count(&self) -> usize {
        self.inner.lock().expect("Mutex poisoned").conversations.len()
    }

    /// Number of cached message keys across all conversations.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn message_key_count(&self) -> usize {
        self.inner.lock().expect("Mutex poisoned").message_keys.len()
    }

    /// Sorted ids of the cached message keys.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn message_key_ids(&self) -> Vec<String> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        let mut ids: Vec<String> = inner.message_keys.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalDatasource for MemoryStorage {
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for test
    /// code.
    #[allow(clippy::expect_used)]
    fn save_or_update_conversation(&self, conversation: &Conversation) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        inner.conversations.insert(conversation.id(), conversation.clone());
        Ok(())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn get_conversation(&self, id: ConversationId) -> Result<Option<Conversation>, StorageError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        Ok(inner.conversations.get(&id).cloned())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn save_message_key(&self, id: &str, key: &MessageKey) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        inner.message_keys.insert(id.to_string(), key.clone());
        Ok(())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn pop_message_key(&self, id: &str) -> Result<Option<MessageKey>, StorageError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        Ok(inner.message_keys.remove(id))
    }
}
