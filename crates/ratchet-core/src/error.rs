//! Error types for ratchet engine operations

use ratchet_crypto::CryptoError;
use thiserror::Error;

use crate::{conversation::ConversationId, storage::StorageError};

/// Errors returned by [`crate::RatchetEngine`].
///
/// Every failing call returns exactly one of these. None are retried
/// internally.
#[derive(Debug, Error)]
pub enum RatchetError {
    /// No persisted state for this conversation
    #[error("conversation not found: {id}")]
    ConversationNotFound {
        /// Requested conversation
        id: ConversationId,
    },

    /// The operation needs a chain that does not exist yet
    #[error("conversation not set up: {id}")]
    ConversationNotSetup {
        /// Conversation missing the chain
        id: ConversationId,
    },

    /// The conversation already has a root key
    #[error("conversation already set up: {id}")]
    ConversationAlreadySetup {
        /// Conversation that was already initialized
        id: ConversationId,
    },

    /// The message key is neither derivable nor cached
    ///
    /// Either a replay of an already decrypted message or a storage
    /// inconsistency. Never retryable.
    #[error("message key not found: conversation {id}, message {message_number}")]
    MessageKeyNotFound {
        /// Conversation the message belongs to
        id: ConversationId,
        /// Message number from the header
        message_number: u32,
    },

    /// Shared salt length differs from the configured root key size
    #[error("invalid salt size: expected {expected}, got {actual}")]
    InvalidSaltSize {
        /// Configured root key size
        expected: usize,
        /// Supplied salt length
        actual: usize,
    },

    /// Header lacked the chain key needed to bootstrap receiving
    ///
    /// Only meaningful for protocol variants that carry the initial chain
    /// key inside the first header. The salt-seeded engine never returns it.
    #[error("required chain key missing from header")]
    RequiredChainKeyMissing,

    /// Header claims more skipped messages than the engine will cache
    #[error("too many skipped messages: expected {current}, got {requested}, limit {max_skip}")]
    TooManySkippedMessages {
        /// Next message number this conversation expects
        current: u32,
        /// Message number in the header
        requested: u32,
        /// Configured limit
        max_skip: u32,
    },

    /// Header counters are inconsistent with each other or with our state
    #[error("invalid header: message {message_number}, sequence {sequence_number}")]
    InvalidHeader {
        /// Message number in the header
        message_number: u32,
        /// Sequence number in the header
        sequence_number: u32,
    },

    /// A message counter would overflow
    #[error("message counter overflow")]
    CounterOverflow,

    /// Storage provider failure, propagated unchanged
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Crypto provider failure, propagated unchanged
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl RatchetError {
    /// Returns true if this message cannot be decrypted by this state.
    ///
    /// Callers must treat it as a replay or protocol violation.
    pub fn is_replay_or_violation(&self) -> bool {
        matches!(
            self,
            Self::MessageKeyNotFound { .. }
                | Self::InvalidHeader { .. }
                | Self::TooManySkippedMessages { .. }
        )
    }

    /// Returns true if retrying the same call may succeed.
    ///
    /// Only storage I/O failures qualify; everything else needs external
    /// corrective action.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Storage(StorageError::Io(_)))
    }
}
