//! Operations for model-based testing.
//!
//! Operations represent everything that can happen between two parties. They
//! are generated randomly by proptest or the fuzzer and applied to a
//! [`super::TwoPartyWorld`].

use arbitrary::Arbitrary;

/// One of the two parties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Arbitrary)]
pub enum PartyId {
    /// Inviter. Cannot send until it has received a message.
    Alice,
    /// Invitee. Can send right after accepting.
    Bob,
}

impl PartyId {
    /// The other party.
    pub fn peer(self) -> Self {
        match self {
            Self::Alice => Self::Bob,
            Self::Bob => Self::Alice,
        }
    }

    /// Stable index for per-party tables.
    pub fn index(self) -> usize {
        match self {
            Self::Alice => 0,
            Self::Bob => 1,
        }
    }

    /// Name for logs and violation messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::Alice => "alice",
            Self::Bob => "bob",
        }
    }
}

/// Operations that can be applied to the world.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Party derives a send key and seals a message to its peer.
    Send {
        /// Sending party.
        from: PartyId,
        /// Plaintext to seal.
        content: SmallMessage,
    },

    /// Deliver one in-flight message, chosen by `pick`, so delivery order is
    /// arbitrary.
    Deliver {
        /// Receiving party.
        to: PartyId,
        /// Index into the in-flight queue, taken modulo its length.
        pick: u8,
    },

    /// Re-deliver the most recently delivered message.
    Replay {
        /// Receiving party.
        to: PartyId,
    },
}

/// Small message content for testing.
///
/// Compact representation to keep test cases small. The content is
/// deterministic from the seed.
#[derive(Debug, Clone, Copy, Arbitrary)]
pub struct SmallMessage {
    /// Message seed (expanded to content).
    pub seed: u8,
    /// Message length hint (0-3 maps to empty/small/medium/large).
    pub size_class: u8,
}

impl SmallMessage {
    /// Expand to actual message bytes.
    pub fn to_bytes(self) -> Vec<u8> {
        let len = match self.size_class % 4 {
            0 => 0,
            1 => 8,
            2 => 64,
            _ => 256,
        };

        (0..len).map(|i| self.seed.wrapping_add(i as u8)).collect()
    }
}

/// Result of applying an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A message was sealed and queued for the peer.
    Sent {
        /// Sending party.
        from: PartyId,
        /// Message number in the header.
        message_number: u32,
    },

    /// A message was received and opened.
    Delivered {
        /// Receiving party.
        to: PartyId,
        /// Message number in the header.
        message_number: u32,
    },

    /// A replayed message was refused.
    ReplayRejected {
        /// Receiving party.
        to: PartyId,
        /// Message number of the replayed header.
        message_number: u32,
    },

    /// The operation had no precondition met and did nothing.
    Skipped(SkipReason),

    /// The engine misbehaved. Recorded in the snapshot for invariants.
    Failed(String),
}

/// Why an operation was a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Sender has no sending chain yet.
    NotReadyToSend,
    /// Nothing queued for the receiver.
    NothingInFlight,
    /// Nothing delivered yet that could be replayed.
    NothingDelivered,
}

impl Outcome {
    /// True unless the engine misbehaved.
    pub fn is_ok(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}
