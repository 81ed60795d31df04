//! Fuzz target for hostile message headers
//!
//! Feeds attacker-chosen headers into an established conversation.
//!
//! # Strategy
//!
//! - Message and sequence numbers anywhere in u32 (0, MAX, huge gaps)
//! - Public keys: the peer's current key, random, all-zero, wrong length
//! - Honest traffic before and between hostile headers
//!
//! # Invariants
//!
//! - The engine NEVER panics on a header
//! - Headers rejected up front (`TooManySkippedMessages`, `InvalidHeader`)
//!   leave the stored conversation byte-for-byte unchanged
//! - `received_last_message_number` never decreases
//! - One call never caches more than `max_skip` keys

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ratchet_core::{LocalDatasource, MessageHeader, RatchetError};
use ratchet_crypto::PublicKey;
use ratchet_harness::{Operation, PartyId, SmallMessage, TwoPartyWorld};

#[derive(Debug, Clone, Arbitrary)]
struct HeaderScenario {
    /// Seed for the honest world
    seed: u64,
    /// Honest messages Bob sends before the attack (0-15)
    honest_sends: u8,
    /// Honest messages Alice receives before the attack
    honest_deliveries: u8,
    /// Hostile headers delivered to Alice
    headers: Vec<HostileHeader>,
}

#[derive(Debug, Clone, Arbitrary)]
struct HostileHeader {
    message_number: u32,
    sequence_number: u32,
    key: HostileKey,
}

#[derive(Debug, Clone, Arbitrary)]
enum HostileKey {
    /// Key Bob is currently sending with
    PeerCurrent,
    /// Arbitrary 32 bytes
    Random([u8; 32]),
    /// Low-order point, DH output is all zero
    Zero,
    /// Wrong length
    Truncated(Vec<u8>),
}

fuzz_target!(|scenario: HeaderScenario| {
    let Ok(mut world) = TwoPartyWorld::new(scenario.seed) else {
        return;
    };
    let content = SmallMessage { seed: 0, size_class: 1 };

    for _ in 0..scenario.honest_sends % 16 {
        world.apply(&Operation::Send { from: PartyId::Bob, content });
    }
    for pick in 0..scenario.honest_deliveries % 16 {
        world.apply(&Operation::Deliver { to: PartyId::Alice, pick });
    }

    let bob_key = world
        .party(PartyId::Bob)
        .conversation()
        .map(|c| c.personal_key_pair().public_key.clone())
        .expect("bob has a conversation");

    let alice = world.party(PartyId::Alice);
    let engine = alice.engine();
    let id = alice.conversation_id();
    let max_skip = engine.config().max_skip as usize;

    for hostile in scenario.headers.into_iter().take(32) {
        let public_key = match hostile.key {
            HostileKey::PeerCurrent => bob_key.clone(),
            HostileKey::Random(bytes) => PublicKey::from_slice(&bytes),
            HostileKey::Zero => PublicKey::from_slice(&[0; 32]),
            HostileKey::Truncated(bytes) => {
                PublicKey::from_vec(bytes.into_iter().take(31).collect())
            },
        };
        let header = MessageHeader {
            message_number: hostile.message_number,
            sequence_number: hostile.sequence_number,
            public_key,
        };

        let before = engine.datasource().get_conversation(id).expect("memory storage");
        let cached_before = engine.datasource().message_key_count();

        // INVARIANT 1: never panics
        let result = engine.get_receive_key(&header, id);

        let after = engine.datasource().get_conversation(id).expect("memory storage");
        let cached_after = engine.datasource().message_key_count();

        // INVARIANT 2: up-front rejections persist nothing
        if matches!(
            result,
            Err(RatchetError::TooManySkippedMessages { .. } | RatchetError::InvalidHeader { .. })
        ) {
            assert_eq!(before, after, "rejected header changed state");
            assert_eq!(cached_before, cached_after, "rejected header cached keys");
        }

        // INVARIANT 3: receive counter is monotonic
        let last_before = before.as_ref().and_then(|c| c.received_last_message_number());
        let last_after = after.as_ref().and_then(|c| c.received_last_message_number());
        assert!(last_after >= last_before, "counter went {last_before:?} → {last_after:?}");

        // INVARIANT 4: bounded cache growth per call
        assert!(
            cached_after <= cached_before + max_skip,
            "cache grew from {cached_before} to {cached_after}"
        );
    }
});
