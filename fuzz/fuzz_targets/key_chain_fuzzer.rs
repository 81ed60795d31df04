//! Fuzz target for key derivation and message sealing
//!
//! Tests the X25519 key repository and AEAD helpers under adversarial inputs.
//!
//! # Strategy
//!
//! - Arbitrary key size configurations (including invalid ones)
//! - Arbitrary root, chain and shared secret bytes
//! - Random chain advance sequences
//! - Seal/open with derived keys, then corrupt the ciphertext
//!
//! # Invariants
//!
//! - Invalid key sizes are rejected, never panic
//! - Derivation is deterministic (same inputs → same output)
//! - Outputs have exactly the configured sizes
//! - Consecutive message keys differ
//! - Seal/open roundtrip succeeds; corrupted ciphertext fails

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ratchet_crypto::{
    open_message, seal_message, ChainKey, KeyRepository, KeySizes, MessageKey, Rng, RootKey,
    SharedSecret, X25519KeyRepository, NONCE_SIZE,
};

#[derive(Debug, Clone, Arbitrary)]
struct ChainScenario {
    /// Key sizes, clamped to 0..=128 so invalid zero sizes show up
    sizes: [u8; 4],
    rng_seed: [u8; 32],
    root: Vec<u8>,
    shared: Vec<u8>,
    operations: Vec<ChainOperation>,
    nonce: [u8; NONCE_SIZE],
}

#[derive(Debug, Clone, Arbitrary)]
enum ChainOperation {
    /// Advance the chain one step
    Advance,
    /// Seal a message with the latest message key
    Seal { message: Vec<u8>, flip: u16 },
    /// Re-derive from the same chain key and compare
    VerifyDeterminism,
    /// Root step with fresh DH output
    RootStep,
}

fuzz_target!(|scenario: ChainScenario| {
    let [message_key, chain_key, root_key, shared_secret] =
        scenario.sizes.map(|size| usize::from(size % 129));
    let sizes = KeySizes { message_key, chain_key, root_key, shared_secret };

    // INVARIANT 1: invalid sizes are rejected up front
    let Ok(repo) = X25519KeyRepository::with_rng(sizes, Rng::from_seed(scenario.rng_seed)) else {
        assert!(sizes.validate().is_err());
        return;
    };

    let root = RootKey::from_vec(scenario.root);
    let shared = SharedSecret::from_vec(scenario.shared);
    let Ok((mut root, mut chain)) = repo.derive_root_keys(&root, &shared) else {
        return;
    };
    assert_eq!(root.len(), root_key);
    assert_eq!(chain.len(), chain_key);

    let mut last_message: Option<MessageKey> = None;

    for op in scenario.operations.into_iter().take(64) {
        match op {
            ChainOperation::Advance => {
                let (next, message) = repo.derive_chain_keys(&chain).expect("valid sizes");
                assert_eq!(next.len(), chain_key);
                assert_eq!(message.len(), message_key);

                // INVARIANT 2: consecutive message keys differ
                if let Some(previous) = &last_message {
                    assert_ne!(previous, &message, "message key repeated");
                }
                chain = next;
                last_message = Some(message);
            },
            ChainOperation::VerifyDeterminism => {
                let copy = ChainKey::from_slice(chain.as_bytes());
                let a = repo.derive_chain_keys(&chain).expect("valid sizes");
                let b = repo.derive_chain_keys(&copy).expect("valid sizes");
                assert_eq!(a, b, "chain derivation must be deterministic");
            },
            ChainOperation::RootStep => {
                let ours = repo.generate_key_pair().expect("seeded rng");
                let theirs = repo.generate_key_pair().expect("seeded rng");

                // INVARIANT 3: DH is symmetric
                let a =
                    repo.create_diffie_hellman_shared_secret(&theirs.public_key, &ours.private_key);
                let b =
                    repo.create_diffie_hellman_shared_secret(&ours.public_key, &theirs.private_key);
                let (Ok(a), Ok(b)) = (a, b) else {
                    panic!("fresh key pairs must agree");
                };
                assert_eq!(a, b);
                assert_eq!(a.len(), shared_secret);

                let (next_root, next_chain) =
                    repo.derive_root_keys(&root, &a).expect("valid sizes");
                root = next_root;
                chain = next_chain;
            },
            ChainOperation::Seal { message, flip } => {
                let Some(key) = &last_message else { continue };
                let aad = b"header";

                match seal_message(&message, key, aad, scenario.nonce) {
                    Ok(mut sealed) => {
                        // INVARIANT 4: roundtrip
                        let opened = open_message(&sealed, key, aad).expect("roundtrip");
                        assert_eq!(opened, message);

                        // INVARIANT 5: corruption is detected
                        let index = usize::from(flip) % sealed.ciphertext.len();
                        sealed.ciphertext[index] ^= 0x01;
                        assert!(open_message(&sealed, key, aad).is_err());
                    },
                    Err(_) => assert_ne!(message_key, 32, "32-byte keys must seal"),
                }
            },
        }
    }
});
