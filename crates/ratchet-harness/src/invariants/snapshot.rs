//! Observable state snapshots for invariant checking.
//!
//! Invariants operate on snapshots rather than live engines so every check
//! sees one consistent view.

use crate::model::PartyId;

/// Snapshot of a whole two-party world.
#[derive(Debug, Clone, Default)]
pub struct WorldSnapshot {
    /// Per-party state.
    pub parties: Vec<PartySnapshot>,
    /// Every delivery so far, in order.
    pub deliveries: Vec<DeliveryRecord>,
    /// Every replay attempt so far, in order.
    pub replays: Vec<ReplayRecord>,
    /// Engine errors no operation should have produced.
    pub failures: Vec<String>,
}

impl WorldSnapshot {
    /// Snapshot with no parties and no history.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True if no message is in flight to anyone.
    pub fn is_quiescent(&self) -> bool {
        self.parties.iter().all(|party| party.in_flight == 0)
    }
}

/// Snapshot of one party.
#[derive(Debug, Clone)]
pub struct PartySnapshot {
    /// Which party.
    pub party: PartyId,
    /// `received_last_message_number` after every applied operation.
    pub received_last_history: Vec<Option<u32>>,
    /// Skipped message keys currently cached.
    pub cached_keys: usize,
    /// Messages queued for this party.
    pub in_flight: usize,
}

impl PartySnapshot {
    /// Snapshot with no history.
    pub fn new(party: PartyId) -> Self {
        Self { party, received_last_history: Vec::new(), cached_keys: 0, in_flight: 0 }
    }
}

/// Outcome of one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRecord {
    /// Receiving party.
    pub to: PartyId,
    /// Message number in the header.
    pub message_number: u32,
    /// Receiver derived the key the sender used.
    pub keys_match: bool,
    /// Ciphertext opened to the original plaintext.
    pub plaintext_matches: bool,
}

/// Outcome of one replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayRecord {
    /// Receiving party.
    pub to: PartyId,
    /// Message number of the replayed header.
    pub message_number: u32,
    /// Engine refused it with `MessageKeyNotFound`.
    pub rejected: bool,
}
