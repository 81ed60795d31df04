//! Fuzz target for the engine under storage failures
//!
//! Tests receive catch-up when storage operations fail randomly. Uses
//! ChaoticStorage to inject I/O errors at configurable rates.
//!
//! # Strategy
//!
//! - Variable failure rates (0% to 80%)
//! - Arbitrary delivery order of an honest burst
//! - Every transient failure is retried
//!
//! # Invariants
//!
//! - The engine NEVER panics on storage errors
//! - Storage errors surface as transient errors
//! - Retried receives yield exactly the sender's keys
//! - The cache is empty once every message is delivered

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ratchet_core::{ChaoticStorage, MemoryStorage, RatchetEngine};
use ratchet_crypto::{SharedSecret, X25519KeyRepository};
use ratchet_harness::SeededEnv;

const MAX_ATTEMPTS: usize = 500;

#[derive(Debug, Clone, Arbitrary)]
struct ChaosScenario {
    /// Seed for keys and identifiers
    seed: u64,
    /// Seed for ChaoticStorage RNG (deterministic failures)
    chaos_seed: u64,
    /// Failure rate 0-8 maps to 0%-80%
    failure_rate_tenth: u8,
    /// Number of messages (1-16)
    message_count: u8,
    /// Delivery order, as picks into the remaining messages
    picks: Vec<u8>,
}

fuzz_target!(|scenario: ChaosScenario| {
    let failure_rate = f64::from(scenario.failure_rate_tenth % 9) / 10.0;
    let env = SeededEnv::with_seed(scenario.seed);
    let salt = SharedSecret::from_slice(&[0x42; 32]);

    let bob_storage = MemoryStorage::new();
    let bob_setup = RatchetEngine::new(
        bob_storage.clone(),
        X25519KeyRepository::from_seed(env.seed_bytes()),
        env.clone(),
    );
    let alice = RatchetEngine::new(
        MemoryStorage::new(),
        X25519KeyRepository::from_seed(env.seed_bytes()),
        env.clone(),
    );

    let invitation = bob_setup.create_invitation(&salt, None).expect("reliable storage");
    let bob_id = invitation.conversation_id;
    let alice_id = alice
        .create_new_conversation_from_invitation(&invitation.public_key, &salt, None)
        .expect("reliable storage");

    let bob = RatchetEngine::new(
        ChaoticStorage::with_seed(bob_storage, failure_rate, scenario.chaos_seed),
        X25519KeyRepository::from_seed(env.seed_bytes()),
        env.clone(),
    );

    let count = usize::from(scenario.message_count % 16) + 1;
    let mut pending: Vec<_> =
        (0..count).map(|_| alice.get_send_data(alice_id).expect("reliable storage")).collect();

    let mut picks = scenario.picks.into_iter();
    while !pending.is_empty() {
        let pick = usize::from(picks.next().unwrap_or(0)) % pending.len();
        let message = pending.remove(pick);

        let mut resolved = None;
        for _ in 0..MAX_ATTEMPTS {
            match bob.get_receive_key(&message.message_header, bob_id) {
                Ok(key) => {
                    resolved = Some(key);
                    break;
                },
                Err(e) => assert!(e.is_transient(), "non-transient error: {e}"),
            }
        }

        // Retries at a rate below 1.0 eventually get through
        let Some(key) = resolved else { return };
        assert_eq!(key, message.message_key, "retry derived a different key");
    }

    assert_eq!(bob.datasource().inner().message_key_count(), 0);
});
