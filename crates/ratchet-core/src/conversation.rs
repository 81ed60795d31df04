//! Conversation state.
//!
//! A [`Conversation`] is one party's view of one peer relationship. Its
//! chain state is a [`ConversationState`] variant carrying exactly the keys
//! valid in that phase, so a receive chain without a root key, or a sending
//! chain without a handshake, cannot be represented.
//!
//! ```text
//!  create_invitation_without_salt      create_invitation(salt)
//!              │                               │
//!              ▼       get_first_receive_key   ▼
//!          Invited ──────── seed_root ──► AwaitingFirstReceive ──┐
//!                                                                │ enter_epoch
//!  create_new_conversation_from_invitation                       ▼
//!              │                                            Established ◄─┐
//!              ▼                 enter_epoch                     │        │
//!          Accepted ────────────────────────────────────────────►│        │
//!                                                                └────────┘
//!                                           advance_sending / advance_receiving
//!                                           / enter_epoch
//! ```
//!
//! Transitions consume the snapshot and return the next one. Only the engine
//! calls them; dropping the old snapshot wipes its keys.

use std::fmt;

use ratchet_crypto::{AsymmetricKeyPair, ChainKey, PublicKey, RootKey};
use serde::{Deserialize, Serialize};

use crate::{env::Environment, error::RatchetError};

/// Identifier of a conversation, rendered as a hyphenated UUID.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationId(u128);

impl ConversationId {
    /// Wrap a raw 128-bit value.
    pub const fn from_u128(value: u128) -> Self {
        Self(value)
    }

    /// Raw 128-bit value.
    pub const fn as_u128(self) -> u128 {
        self.0
    }

    /// Random version 4 UUID drawn from the environment.
    pub fn random(env: &impl Environment) -> Self {
        let raw = env.random_u128();
        let versioned = (raw & !(0xF << 76)) | (0x4 << 76);
        let variant = (versioned & !(0x3 << 62)) | (0x2 << 62);
        Self(variant)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
            (v >> 96) as u32,
            (v >> 80) as u16,
            (v >> 64) as u16,
            (v >> 48) as u16,
            v & 0xFFFF_FFFF_FFFF,
        )
    }
}

impl fmt::Debug for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConversationId({self})")
    }
}

/// Chain state of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversationState {
    /// Invitation sent without a salt. The root key arrives with the first
    /// received message.
    Invited,

    /// Inviter seeded with the shared salt, waiting for the peer's first
    /// message.
    AwaitingFirstReceive {
        /// Root key seeded from the shared salt
        root_key: RootKey,
    },

    /// Invitee after the handshake. Can send, has not received yet.
    Accepted {
        /// Root key after the handshake step
        root_key: RootKey,
        /// Chain for outgoing messages
        sending_chain_key: ChainKey,
    },

    /// Both directions are live.
    Established {
        /// Current root key
        root_key: RootKey,
        /// Chain for outgoing messages
        sending_chain_key: ChainKey,
        /// Chain for the peer's current epoch
        receive_chain_key: ChainKey,
        /// Public key the peer used in its current epoch
        last_contact_public_key: PublicKey,
        /// Highest message number processed so far
        received_last_message_number: u32,
    },
}

impl ConversationState {
    /// Short phase name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Invited => "invited",
            Self::AwaitingFirstReceive { .. } => "awaiting_first_receive",
            Self::Accepted { .. } => "accepted",
            Self::Established { .. } => "established",
        }
    }
}

/// Keys produced by a Diffie-Hellman epoch step.
///
/// The receive half re-keys the peer's chain; the send half rolls our own key
/// pair so the next send opens a new epoch.
pub(crate) struct EpochKeys {
    pub root_key: RootKey,
    pub receive_chain_key: ChainKey,
    pub last_contact_public_key: PublicKey,
    pub personal_key_pair: AsymmetricKeyPair,
    pub sending_chain_key: ChainKey,
}

/// One party's ratchet state for one peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    id: ConversationId,
    personal_key_pair: AsymmetricKeyPair,
    next_message_number: u32,
    next_sequence_number: u32,
    state: ConversationState,
}

impl Conversation {
    pub(crate) fn invited(id: ConversationId, personal_key_pair: AsymmetricKeyPair) -> Self {
        Self::with_state(id, personal_key_pair, ConversationState::Invited)
    }

    pub(crate) fn awaiting_first_receive(
        id: ConversationId,
        personal_key_pair: AsymmetricKeyPair,
        root_key: RootKey,
    ) -> Self {
        let state = ConversationState::AwaitingFirstReceive { root_key };
        Self::with_state(id, personal_key_pair, state)
    }

    pub(crate) fn accepted(
        id: ConversationId,
        personal_key_pair: AsymmetricKeyPair,
        root_key: RootKey,
        sending_chain_key: ChainKey,
    ) -> Self {
        Self::with_state(
            id,
            personal_key_pair,
            ConversationState::Accepted { root_key, sending_chain_key },
        )
    }

    fn with_state(
        id: ConversationId,
        personal_key_pair: AsymmetricKeyPair,
        state: ConversationState,
    ) -> Self {
        Self { id, personal_key_pair, next_message_number: 0, next_sequence_number: 0, state }
    }

    /// Conversation identifier.
    pub fn id(&self) -> ConversationId {
        self.id
    }

    /// Current key pair used for outgoing Diffie-Hellman steps.
    pub fn personal_key_pair(&self) -> &AsymmetricKeyPair {
        &self.personal_key_pair
    }

    /// Total number of messages sent.
    pub fn next_message_number(&self) -> u32 {
        self.next_message_number
    }

    /// Messages sent since the last key pair rotation.
    pub fn next_sequence_number(&self) -> u32 {
        self.next_sequence_number
    }

    /// Chain state.
    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    /// Root key, once seeded.
    pub fn root_key(&self) -> Option<&RootKey> {
        match &self.state {
            ConversationState::Invited => None,
            ConversationState::AwaitingFirstReceive { root_key }
            | ConversationState::Accepted { root_key, .. }
            | ConversationState::Established { root_key, .. } => Some(root_key),
        }
    }

    /// Sending chain key, once the handshake allows sending.
    pub fn sending_chain_key(&self) -> Option<&ChainKey> {
        match &self.state {
            ConversationState::Accepted { sending_chain_key, .. }
            | ConversationState::Established { sending_chain_key, .. } => Some(sending_chain_key),
            ConversationState::Invited | ConversationState::AwaitingFirstReceive { .. } => None,
        }
    }

    /// Receive chain key for the peer's current epoch.
    pub fn receive_chain_key(&self) -> Option<&ChainKey> {
        match &self.state {
            ConversationState::Established { receive_chain_key, .. } => Some(receive_chain_key),
            _ => None,
        }
    }

    /// Public key the peer used most recently.
    pub fn last_contact_public_key(&self) -> Option<&PublicKey> {
        match &self.state {
            ConversationState::Established { last_contact_public_key, .. } => {
                Some(last_contact_public_key)
            },
            _ => None,
        }
    }

    /// Highest message number processed so far.
    pub fn received_last_message_number(&self) -> Option<u32> {
        match &self.state {
            ConversationState::Established { received_last_message_number, .. } => {
                Some(*received_last_message_number)
            },
            _ => None,
        }
    }

    /// True iff a sending chain exists.
    pub fn is_ready_for_sending(&self) -> bool {
        self.sending_chain_key().is_some()
    }

    /// True iff a receive chain exists.
    pub fn is_ready_for_receiving(&self) -> bool {
        self.receive_chain_key().is_some()
    }

    /// Seed the root key from the shared salt.
    ///
    /// Only an `Invited` conversation accepts a seed.
    pub(crate) fn seed_root(self, root_key: RootKey) -> Result<Self, RatchetError> {
        match self.state {
            ConversationState::Invited => Ok(Self {
                state: ConversationState::AwaitingFirstReceive { root_key },
                ..self
            }),
            _ => Err(RatchetError::ConversationAlreadySetup { id: self.id }),
        }
    }

    /// Replace the sending chain after one send and bump both counters.
    pub(crate) fn advance_sending(self, next_chain_key: ChainKey) -> Result<Self, RatchetError> {
        let next_message_number =
            self.next_message_number.checked_add(1).ok_or(RatchetError::CounterOverflow)?;
        let next_sequence_number =
            self.next_sequence_number.checked_add(1).ok_or(RatchetError::CounterOverflow)?;

        let state = match self.state {
            ConversationState::Accepted { root_key, .. } => {
                ConversationState::Accepted { root_key, sending_chain_key: next_chain_key }
            },
            ConversationState::Established {
                root_key,
                receive_chain_key,
                last_contact_public_key,
                received_last_message_number,
                ..
            } => ConversationState::Established {
                root_key,
                sending_chain_key: next_chain_key,
                receive_chain_key,
                last_contact_public_key,
                received_last_message_number,
            },
            ConversationState::Invited | ConversationState::AwaitingFirstReceive { .. } => {
                return Err(RatchetError::ConversationNotSetup { id: self.id });
            },
        };

        Ok(Self { state, next_message_number, next_sequence_number, ..self })
    }

    /// Replace the receive chain after deriving the key for `message_number`.
    pub(crate) fn advance_receiving(
        self,
        next_chain_key: ChainKey,
        message_number: u32,
    ) -> Result<Self, RatchetError> {
        match self.state {
            ConversationState::Established {
                root_key,
                sending_chain_key,
                last_contact_public_key,
                received_last_message_number,
                ..
            } => {
                debug_assert!(message_number > received_last_message_number);
                Ok(Self {
                    state: ConversationState::Established {
                        root_key,
                        sending_chain_key,
                        receive_chain_key: next_chain_key,
                        last_contact_public_key,
                        received_last_message_number: message_number,
                    },
                    ..self
                })
            },
            _ => Err(RatchetError::ConversationNotSetup { id: self.id }),
        }
    }

    /// Start a new epoch at `message_number`.
    ///
    /// Receive side and send side roll together: one transition, one
    /// checkpoint. The sequence counter restarts because the key pair changed.
    pub(crate) fn enter_epoch(
        self,
        keys: EpochKeys,
        message_number: u32,
    ) -> Result<Self, RatchetError> {
        if let Some(last) = self.received_last_message_number() {
            debug_assert!(message_number > last);
        }
        if self.root_key().is_none() {
            return Err(RatchetError::ConversationNotSetup { id: self.id });
        }

        Ok(Self {
            personal_key_pair: keys.personal_key_pair,
            next_sequence_number: 0,
            state: ConversationState::Established {
                root_key: keys.root_key,
                sending_chain_key: keys.sending_chain_key,
                receive_chain_key: keys.receive_chain_key,
                last_contact_public_key: keys.last_contact_public_key,
                received_last_message_number: message_number,
            },
            ..self
        })
    }
}

#[cfg(test)]
mod tests {
    use ratchet_crypto::PrivateKey;

    use super::*;

    #[derive(Clone)]
    struct FixedEnv(u8);

    impl Environment for FixedEnv {
        fn random_bytes(&self, buffer: &mut [u8]) {
            buffer.fill(self.0);
        }
    }

    fn key_pair(byte: u8) -> AsymmetricKeyPair {
        AsymmetricKeyPair {
            public_key: PublicKey::from_slice(&[byte; 32]),
            private_key: PrivateKey::from_slice(&[byte.wrapping_add(1); 32]),
        }
    }

    fn chain(byte: u8) -> ChainKey {
        ChainKey::from_slice(&[byte; 32])
    }

    fn root(byte: u8) -> RootKey {
        RootKey::from_slice(&[byte; 32])
    }

    fn epoch_keys(byte: u8) -> EpochKeys {
        EpochKeys {
            root_key: root(byte),
            receive_chain_key: chain(byte),
            last_contact_public_key: PublicKey::from_slice(&[byte; 32]),
            personal_key_pair: key_pair(byte),
            sending_chain_key: chain(byte.wrapping_add(1)),
        }
    }

    fn id() -> ConversationId {
        ConversationId::from_u128(7)
    }

    #[test]
    fn id_displays_as_hyphenated_uuid() {
        let id = ConversationId::from_u128(0x0123_4567_89ab_cdef_0123_4567_89ab_cdef);
        assert_eq!(id.to_string(), "01234567-89ab-cdef-0123-456789abcdef");
    }

    #[test]
    fn random_id_has_version_4_layout() {
        let id = ConversationId::random(&FixedEnv(0xFF)).to_string();

        assert_eq!(&id[14..15], "4", "version nibble");
        assert!(matches!(&id[19..20], "8" | "9" | "a" | "b"), "variant bits");
    }

    #[test]
    fn invited_has_no_keys() {
        let conversation = Conversation::invited(id(), key_pair(1));

        assert!(conversation.root_key().is_none());
        assert!(!conversation.is_ready_for_sending());
        assert!(!conversation.is_ready_for_receiving());
        assert_eq!(conversation.received_last_message_number(), None);
    }

    #[test]
    fn accepted_is_ready_to_send_only() {
        let conversation = Conversation::accepted(id(), key_pair(1), root(2), chain(3));

        assert!(conversation.is_ready_for_sending());
        assert!(!conversation.is_ready_for_receiving());
    }

    #[test]
    fn seed_root_only_from_invited() {
        let seeded = Conversation::invited(id(), key_pair(1)).seed_root(root(9)).unwrap();
        assert_eq!(seeded.root_key(), Some(&root(9)));
        assert_eq!(seeded.state().name(), "awaiting_first_receive");

        let again = seeded.seed_root(root(10));
        assert!(matches!(again, Err(RatchetError::ConversationAlreadySetup { .. })));
    }

    #[test]
    fn advance_sending_bumps_counters() {
        let conversation = Conversation::accepted(id(), key_pair(1), root(2), chain(3));
        let next = conversation.advance_sending(chain(4)).unwrap();

        assert_eq!(next.next_message_number(), 1);
        assert_eq!(next.next_sequence_number(), 1);
        assert_eq!(next.sending_chain_key(), Some(&chain(4)));
        assert_eq!(next.root_key(), Some(&root(2)));
    }

    #[test]
    fn advance_sending_requires_sending_chain() {
        let conversation = Conversation::awaiting_first_receive(id(), key_pair(1), root(2));

        assert!(matches!(
            conversation.advance_sending(chain(4)),
            Err(RatchetError::ConversationNotSetup { .. })
        ));
    }

    #[test]
    fn advance_sending_detects_overflow() {
        let mut conversation = Conversation::accepted(id(), key_pair(1), root(2), chain(3));
        conversation.next_message_number = u32::MAX;

        let result = conversation.advance_sending(chain(4));
        assert!(matches!(result, Err(RatchetError::CounterOverflow)));
    }

    #[test]
    fn enter_epoch_resets_sequence_and_swaps_key_pair() {
        let conversation = Conversation::accepted(id(), key_pair(1), root(2), chain(3))
            .advance_sending(chain(4))
            .unwrap()
            .advance_sending(chain(5))
            .unwrap();

        let next = conversation.enter_epoch(epoch_keys(8), 0).unwrap();

        assert_eq!(next.next_message_number(), 2);
        assert_eq!(next.next_sequence_number(), 0);
        assert_eq!(next.personal_key_pair(), &key_pair(8));
        assert_eq!(next.received_last_message_number(), Some(0));
        assert!(next.is_ready_for_sending());
        assert!(next.is_ready_for_receiving());
    }

    #[test]
    fn enter_epoch_requires_root_key() {
        let conversation = Conversation::invited(id(), key_pair(1));

        assert!(matches!(
            conversation.enter_epoch(epoch_keys(8), 0),
            Err(RatchetError::ConversationNotSetup { .. })
        ));
    }

    #[test]
    fn advance_receiving_moves_counter() {
        let established = Conversation::awaiting_first_receive(id(), key_pair(1), root(2))
            .enter_epoch(epoch_keys(3), 0)
            .unwrap();

        let next = established.advance_receiving(chain(6), 1).unwrap();

        assert_eq!(next.received_last_message_number(), Some(1));
        assert_eq!(next.receive_chain_key(), Some(&chain(6)));
    }

    #[test]
    fn advance_receiving_requires_established() {
        let conversation = Conversation::accepted(id(), key_pair(1), root(2), chain(3));

        assert!(matches!(
            conversation.advance_receiving(chain(6), 0),
            Err(RatchetError::ConversationNotSetup { .. })
        ));
    }

    #[test]
    fn cbor_roundtrip_preserves_state() {
        let conversation = Conversation::awaiting_first_receive(id(), key_pair(1), root(2))
            .enter_epoch(epoch_keys(3), 4)
            .unwrap();

        let mut bytes = Vec::new();
        ciborium::into_writer(&conversation, &mut bytes).unwrap();
        let decoded: Conversation = ciborium::from_reader(bytes.as_slice()).unwrap();

        assert_eq!(decoded, conversation);
    }
}
