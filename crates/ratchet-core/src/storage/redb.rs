//! Redb-backed durable storage implementation.
//!
//! Uses Redb's ACID transactions with Copy-on-Write for crash safety.
//! Conversations and cached message keys survive process restarts.

use std::{path::Path, sync::Arc};

use ratchet_crypto::MessageKey;
use redb::{Database, ReadableTableMetadata, TableDefinition};
use zeroize::Zeroizing;

use super::{LocalDatasource, StorageError};
use crate::conversation::{Conversation, ConversationId};

/// Table: conversations
/// Key: conversation id as big-endian bytes [16 bytes]
/// Value: CBOR-encoded Conversation
const CONVERSATIONS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("conversations");

/// Table: message_keys
/// Key: `"{conversationId} - {messageNumber}"`
/// Value: raw message key bytes
const MESSAGE_KEYS: TableDefinition<&str, &[u8]> = TableDefinition::new("message_keys");

/// Durable storage backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbStorage {
    db: Arc<Database>,
}

impl RedbStorage {
    /// Open or create a Redb database at the given path.
    ///
    /// Creates tables if they don't exist (CONVERSATIONS, MESSAGE_KEYS).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(|e| StorageError::Io(e.to_string()))?;

        let txn = db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let _ = txn.open_table(CONVERSATIONS).map_err(|e| StorageError::Io(e.to_string()))?;
            let _ = txn.open_table(MESSAGE_KEYS).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Number of cached message keys.
    pub fn message_key_count(&self) -> Result<u64, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;
        let table = txn.open_table(MESSAGE_KEYS).map_err(|e| StorageError::Io(e.to_string()))?;

        table.len().map_err(|e| StorageError::Io(e.to_string()))
    }
}

impl LocalDatasource for RedbStorage {
    fn save_or_update_conversation(&self, conversation: &Conversation) -> Result<(), StorageError> {
        let bytes = encode_conversation(conversation)?;

        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let mut table =
                txn.open_table(CONVERSATIONS).map_err(|e| StorageError::Io(e.to_string()))?;

            let key = encode_conversation_key(conversation.id());
            table
                .insert(key.as_slice(), bytes.as_slice())
                .map_err(|e| StorageError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(())
    }

    fn get_conversation(&self, id: ConversationId) -> Result<Option<Conversation>, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;

        let table = txn.open_table(CONVERSATIONS).map_err(|e| StorageError::Io(e.to_string()))?;

        let key = encode_conversation_key(id);

        match table.get(key.as_slice()).map_err(|e| StorageError::Io(e.to_string()))? {
            Some(value) => {
                let conversation: Conversation = ciborium::from_reader(value.value())
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                Ok(Some(conversation))
            },
            None => Ok(None),
        }
    }

    fn save_message_key(&self, id: &str, key: &MessageKey) -> Result<(), StorageError> {
        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let mut table =
                txn.open_table(MESSAGE_KEYS).map_err(|e| StorageError::Io(e.to_string()))?;

            table.insert(id, key.as_bytes()).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(())
    }

    fn pop_message_key(&self, id: &str) -> Result<Option<MessageKey>, StorageError> {
        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;

        // Read and remove in one write transaction
        let key = {
            let mut table =
                txn.open_table(MESSAGE_KEYS).map_err(|e| StorageError::Io(e.to_string()))?;

            let removed = table.remove(id).map_err(|e| StorageError::Io(e.to_string()))?;
            removed.map(|value| MessageKey::from_slice(value.value()))
        };

        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(key)
    }
}

/// CBOR-encode a conversation. The buffer holds every key of the
/// conversation, so it is wiped on drop whichever way the caller exits.
fn encode_conversation(conversation: &Conversation) -> Result<Zeroizing<Vec<u8>>, StorageError> {
    let mut bytes = Zeroizing::new(Vec::new());
    ciborium::into_writer(conversation, &mut *bytes)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(bytes)
}

/// Encode a conversation id as 16-byte big-endian key.
fn encode_conversation_key(id: ConversationId) -> [u8; 16] {
    id.as_u128().to_be_bytes()
}
