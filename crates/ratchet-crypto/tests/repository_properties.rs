//! Property-based tests for the X25519 key repository
//!
//! These tests verify the invariants both parties rely on:
//!
//! 1. **Symmetry**: DH(pub_b, priv_a) == DH(pub_a, priv_b)
//! 2. **Determinism**: both KDF steps are pure functions of their inputs
//! 3. **Key uniqueness**: successive chain steps never repeat a message key
//! 4. **Sealing**: a message key opens exactly what it sealed

use ratchet_crypto::{
    ChainKey, KeyRepository, KeySizes, MessageKey, NONCE_SIZE, RootKey, Rng, SharedSecret,
    X25519KeyRepository, open_message, seal_message,
};
use proptest::prelude::*;

fn seeded(seed: [u8; 32]) -> X25519KeyRepository {
    X25519KeyRepository::from_seed(seed)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_diffie_hellman_symmetric(seed in any::<[u8; 32]>()) {
        let repo = seeded(seed);
        let alice = repo.generate_key_pair().unwrap();
        let bob = repo.generate_key_pair().unwrap();

        let ab =
            repo.create_diffie_hellman_shared_secret(&bob.public_key, &alice.private_key).unwrap();
        let ba =
            repo.create_diffie_hellman_shared_secret(&alice.public_key, &bob.private_key).unwrap();

        prop_assert_eq!(ab, ba);
    }

    #[test]
    fn prop_symmetry_across_independent_repositories(
        seed_a in any::<[u8; 32]>(),
        seed_b in any::<[u8; 32]>(),
    ) {
        // Each party runs its own repository; only public keys cross over.
        let alice_repo = seeded(seed_a);
        let bob_repo = seeded(seed_b);
        let alice = alice_repo.generate_key_pair().unwrap();
        let bob = bob_repo.generate_key_pair().unwrap();

        let ab = alice_repo
            .create_diffie_hellman_shared_secret(&bob.public_key, &alice.private_key)
            .unwrap();
        let ba = bob_repo
            .create_diffie_hellman_shared_secret(&alice.public_key, &bob.private_key)
            .unwrap();

        prop_assert_eq!(ab, ba);
    }

    #[test]
    fn prop_chain_step_deterministic(chain in prop::collection::vec(any::<u8>(), 32..=32)) {
        let repo = seeded([0; 32]);
        let chain_key = ChainKey::from_vec(chain);

        let (next_1, message_1) = repo.derive_chain_keys(&chain_key).unwrap();
        let (next_2, message_2) = repo.derive_chain_keys(&chain_key).unwrap();

        prop_assert_eq!(next_1, next_2);
        prop_assert_eq!(message_1, message_2);
    }

    #[test]
    fn prop_root_step_deterministic(
        root in prop::collection::vec(any::<u8>(), 32..=32),
        shared in prop::collection::vec(any::<u8>(), 32..=32),
    ) {
        // Different RNG seeds must not influence derivation
        let repo_1 = seeded([1; 32]);
        let repo_2 = seeded([2; 32]);
        let root_key = RootKey::from_vec(root);
        let shared_secret = SharedSecret::from_vec(shared);

        let (root_1, chain_1) = repo_1.derive_root_keys(&root_key, &shared_secret).unwrap();
        let (root_2, chain_2) = repo_2.derive_root_keys(&root_key, &shared_secret).unwrap();

        prop_assert_eq!(root_1, root_2);
        prop_assert_eq!(chain_1, chain_2);
    }

    #[test]
    fn prop_chain_message_keys_unique(
        chain in prop::collection::vec(any::<u8>(), 32..=32),
        steps in 2usize..20,
    ) {
        let repo = seeded([0; 32]);
        let mut chain_key = ChainKey::from_vec(chain);
        let mut keys: Vec<MessageKey> = Vec::with_capacity(steps);

        for _ in 0..steps {
            let (next, message) = repo.derive_chain_keys(&chain_key).unwrap();
            chain_key = next;
            keys.push(message);
        }

        for i in 0..keys.len() {
            for j in (i + 1)..keys.len() {
                prop_assert_ne!(&keys[i], &keys[j], "message keys {} and {} must differ", i, j);
            }
        }
    }

    #[test]
    fn prop_configured_sizes_respected(
        message in 1usize..128,
        chain in 1usize..128,
        root in 1usize..128,
        shared in 1usize..128,
    ) {
        let sizes = KeySizes {
            message_key: message,
            chain_key: chain,
            root_key: root,
            shared_secret: shared,
        };
        let repo = X25519KeyRepository::with_rng(sizes, Rng::from_seed([3; 32])).unwrap();
        let alice = repo.generate_key_pair().unwrap();
        let bob = repo.generate_key_pair().unwrap();

        let shared_secret =
            repo.create_diffie_hellman_shared_secret(&bob.public_key, &alice.private_key).unwrap();
        let (root_key, chain_key) =
            repo.derive_root_keys(&RootKey::from_vec(vec![0; root]), &shared_secret).unwrap();
        let (next_chain, message_key) = repo.derive_chain_keys(&chain_key).unwrap();

        prop_assert_eq!(shared_secret.len(), shared);
        prop_assert_eq!(root_key.len(), root);
        prop_assert_eq!(chain_key.len(), chain);
        prop_assert_eq!(next_chain.len(), chain);
        prop_assert_eq!(message_key.len(), message);
    }

    #[test]
    fn prop_seal_open(
        plaintext in prop::collection::vec(any::<u8>(), 0..1000),
        associated_data in prop::collection::vec(any::<u8>(), 0..64),
        key in prop::collection::vec(any::<u8>(), 32..=32),
        nonce in any::<[u8; NONCE_SIZE]>(),
    ) {
        let message_key = MessageKey::from_vec(key);

        let sealed = seal_message(&plaintext, &message_key, &associated_data, nonce).unwrap();
        let opened = open_message(&sealed, &message_key, &associated_data).unwrap();

        prop_assert_eq!(sealed.plaintext_len(), plaintext.len());
        prop_assert_eq!(opened, plaintext);
    }
}
