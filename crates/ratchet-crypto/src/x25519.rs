//! Reference [`KeyRepository`] over X25519 and HKDF-SHA512.

use x25519_dalek::{PublicKey as DalekPublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::{
    error::CryptoError,
    kdf,
    keys::{AsymmetricKeyPair, ChainKey, MessageKey, PrivateKey, PublicKey, RootKey, SharedSecret},
    repository::{KeyRepository, KeySizes},
    rng::Rng,
};

/// X25519 key and public key length.
pub const X25519_KEY_SIZE: usize = 32;

/// X25519 key agreement with HKDF-SHA512 derivation.
///
/// Public keys are raw 32-byte Montgomery u-coordinates. Private keys are the
/// 32 random bytes the static secret was built from; clamping happens on use.
///
/// When `sizes.shared_secret` differs from 32 the Diffie-Hellman output is
/// resized through HKDF, which keeps agreement symmetric.
#[derive(Debug)]
pub struct X25519KeyRepository {
    sizes: KeySizes,
    rng: Rng,
}

impl X25519KeyRepository {
    /// Repository with default key sizes seeded from OS entropy.
    pub fn new() -> Result<Self, CryptoError> {
        Self::with_rng(KeySizes::default(), Rng::from_os_entropy()?)
    }

    /// Repository with explicit key sizes and RNG.
    pub fn with_rng(sizes: KeySizes, rng: Rng) -> Result<Self, CryptoError> {
        sizes.validate()?;
        Ok(Self { sizes, rng })
    }

    /// Deterministic repository with default key sizes, for tests.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self { sizes: KeySizes::default(), rng: Rng::from_seed(seed) }
    }
}

impl KeyRepository for X25519KeyRepository {
    fn sizes(&self) -> &KeySizes {
        &self.sizes
    }

    fn generate_key_pair(&self) -> Result<AsymmetricKeyPair, CryptoError> {
        let mut bytes: [u8; X25519_KEY_SIZE] = self.rng.random_array()?;
        let secret = StaticSecret::from(bytes);
        let public = DalekPublicKey::from(&secret);

        let pair = AsymmetricKeyPair {
            public_key: PublicKey::from_slice(public.as_bytes()),
            private_key: PrivateKey::from_slice(&bytes),
        };
        bytes.zeroize();

        Ok(pair)
    }

    fn create_diffie_hellman_shared_secret(
        &self,
        public_key: &PublicKey,
        private_key: &PrivateKey,
    ) -> Result<SharedSecret, CryptoError> {
        let public: [u8; X25519_KEY_SIZE] = public_key.as_bytes().try_into().map_err(|_| {
            CryptoError::InvalidKeyLength { expected: X25519_KEY_SIZE, actual: public_key.len() }
        })?;
        let mut private: [u8; X25519_KEY_SIZE] =
            private_key.as_bytes().try_into().map_err(|_| CryptoError::InvalidKeyLength {
                expected: X25519_KEY_SIZE,
                actual: private_key.len(),
            })?;

        let secret = StaticSecret::from(private);
        private.zeroize();

        let shared = secret.diffie_hellman(&DalekPublicKey::from(public));
        if !shared.was_contributory() {
            return Err(CryptoError::NonContributory);
        }

        if self.sizes.shared_secret == X25519_KEY_SIZE {
            Ok(SharedSecret::from_slice(shared.as_bytes()))
        } else {
            let resized = kdf::resize_shared_secret(shared.as_bytes(), self.sizes.shared_secret)?;
            Ok(SharedSecret::from_vec(resized))
        }
    }

    fn derive_root_keys(
        &self,
        root_key: &RootKey,
        shared_secret: &SharedSecret,
    ) -> Result<(RootKey, ChainKey), CryptoError> {
        let (root, chain) = kdf::derive_root(
            root_key.as_bytes(),
            shared_secret.as_bytes(),
            self.sizes.root_key,
            self.sizes.chain_key,
        )?;
        Ok((RootKey::from_vec(root), ChainKey::from_vec(chain)))
    }

    fn derive_chain_keys(
        &self,
        chain_key: &ChainKey,
    ) -> Result<(ChainKey, MessageKey), CryptoError> {
        let (chain, message) =
            kdf::derive_chain(chain_key.as_bytes(), self.sizes.chain_key, self.sizes.message_key)?;
        Ok((ChainKey::from_vec(chain), MessageKey::from_vec(message)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repository() -> X25519KeyRepository {
        X25519KeyRepository::from_seed([42; 32])
    }

    #[test]
    fn key_pair_has_x25519_sizes() {
        let pair = repository().generate_key_pair().unwrap();

        assert_eq!(pair.public_key.len(), 32);
        assert_eq!(pair.private_key.len(), 32);
    }

    #[test]
    fn consecutive_key_pairs_differ() {
        let repo = repository();
        let a = repo.generate_key_pair().unwrap();
        let b = repo.generate_key_pair().unwrap();

        assert_ne!(a.public_key, b.public_key);
    }

    #[test]
    fn same_seed_generates_same_key_pairs() {
        let a = repository().generate_key_pair().unwrap();
        let b = repository().generate_key_pair().unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn diffie_hellman_is_symmetric() {
        let repo = repository();
        let alice = repo.generate_key_pair().unwrap();
        let bob = repo.generate_key_pair().unwrap();

        let ab =
            repo.create_diffie_hellman_shared_secret(&bob.public_key, &alice.private_key).unwrap();
        let ba =
            repo.create_diffie_hellman_shared_secret(&alice.public_key, &bob.private_key).unwrap();

        assert_eq!(ab, ba);
    }

    #[test]
    fn resized_shared_secret_is_symmetric() {
        let sizes = KeySizes { shared_secret: 48, ..KeySizes::default() };
        let repo = X25519KeyRepository::with_rng(sizes, Rng::from_seed([1; 32])).unwrap();
        let alice = repo.generate_key_pair().unwrap();
        let bob = repo.generate_key_pair().unwrap();

        let ab =
            repo.create_diffie_hellman_shared_secret(&bob.public_key, &alice.private_key).unwrap();
        let ba =
            repo.create_diffie_hellman_shared_secret(&alice.public_key, &bob.private_key).unwrap();

        assert_eq!(ab.len(), 48);
        assert_eq!(ab, ba);
    }

    #[test]
    fn wrong_public_key_length_is_rejected() {
        let repo = repository();
        let pair = repo.generate_key_pair().unwrap();

        let short = PublicKey::from_slice(&[1; 31]);
        let result = repo.create_diffie_hellman_shared_secret(&short, &pair.private_key);

        assert!(matches!(result, Err(CryptoError::InvalidKeyLength { expected: 32, actual: 31 })));
    }

    #[test]
    fn low_order_public_key_is_rejected() {
        let repo = repository();
        let pair = repo.generate_key_pair().unwrap();

        let low_order = PublicKey::from_slice(&[0; 32]);
        let result = repo.create_diffie_hellman_shared_secret(&low_order, &pair.private_key);

        assert!(matches!(result, Err(CryptoError::NonContributory)));
    }

    #[test]
    fn root_step_yields_configured_sizes() {
        let sizes = KeySizes { root_key: 64, chain_key: 16, ..KeySizes::default() };
        let repo = X25519KeyRepository::with_rng(sizes, Rng::from_seed([2; 32])).unwrap();

        let (root, chain) = repo
            .derive_root_keys(&RootKey::from_slice(&[1; 64]), &SharedSecret::from_slice(&[2; 32]))
            .unwrap();

        assert_eq!(root.len(), 64);
        assert_eq!(chain.len(), 16);
    }

    #[test]
    fn chain_step_separates_message_and_chain_keys() {
        let repo = repository();
        let (next, message) = repo.derive_chain_keys(&ChainKey::from_slice(&[9; 32])).unwrap();

        assert_ne!(next.as_bytes(), message.as_bytes());
        assert_ne!(next.as_bytes(), &[9; 32]);
    }

    #[test]
    fn invalid_sizes_are_rejected_at_construction() {
        let sizes = KeySizes { message_key: 0, ..KeySizes::default() };

        assert!(X25519KeyRepository::with_rng(sizes, Rng::from_seed([0; 32])).is_err());
    }
}
