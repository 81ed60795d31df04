//! Values exchanged with the caller.

use ratchet_crypto::{MessageKey, PublicKey};
use serde::{Deserialize, Serialize};

use crate::conversation::ConversationId;

/// Header sent in the clear next to each ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    /// Total messages the sender had sent before this one
    pub message_number: u32,
    /// Messages the sender had sent in its current epoch before this one
    pub sequence_number: u32,
    /// Sender's current public key, identifying its epoch
    pub public_key: PublicKey,
}

impl MessageHeader {
    /// Canonical bytes for binding the header as AEAD associated data.
    ///
    /// Layout: `[message_number: 4 BE][sequence_number: 4 BE][public_key]`.
    /// This is only an authentication input; transport framing is up to the
    /// caller.
    pub fn associated_data(&self) -> Vec<u8> {
        let key = self.public_key.as_bytes();
        let mut out = Vec::with_capacity(8 + key.len());
        out.extend_from_slice(&self.message_number.to_be_bytes());
        out.extend_from_slice(&self.sequence_number.to_be_bytes());
        out.extend_from_slice(key);
        out
    }
}

/// Result of a send: the header to attach and the key to encrypt with.
#[derive(Debug)]
pub struct SendMessageData {
    /// Header to send next to the ciphertext
    pub message_header: MessageHeader,
    /// Single-use key for this message
    pub message_key: MessageKey,
}

/// Result of creating an invitation, handed to the peer out of band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvitationData {
    /// Identifier of the new conversation
    pub conversation_id: ConversationId,
    /// Inviter's public key
    pub public_key: PublicKey,
}
