//! The cryptographic capability consumed by the ratchet engine.

use crate::{
    error::CryptoError,
    kdf::MAX_OUTPUT_LEN,
    keys::{AsymmetricKeyPair, ChainKey, MessageKey, PrivateKey, PublicKey, RootKey, SharedSecret},
};

/// Default size of every symmetric key.
pub const DEFAULT_KEY_SIZE: usize = 32;

/// Byte sizes of the symmetric key types a repository produces.
///
/// All default to 32 bytes and can be overridden independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySizes {
    /// Size of [`MessageKey`]
    pub message_key: usize,
    /// Size of [`ChainKey`]
    pub chain_key: usize,
    /// Size of [`RootKey`], and therefore of the shared salt
    pub root_key: usize,
    /// Size of [`SharedSecret`] produced by Diffie-Hellman
    pub shared_secret: usize,
}

impl KeySizes {
    /// Every key type has the same size.
    pub const fn uniform(size: usize) -> Self {
        Self { message_key: size, chain_key: size, root_key: size, shared_secret: size }
    }

    /// Check every size is non-zero and producible by HKDF-SHA512.
    pub fn validate(&self) -> Result<(), CryptoError> {
        let named = [
            ("message_key", self.message_key),
            ("chain_key", self.chain_key),
            ("root_key", self.root_key),
            ("shared_secret", self.shared_secret),
        ];
        for (name, size) in named {
            if size == 0 || size > MAX_OUTPUT_LEN {
                return Err(CryptoError::InvalidKeySize { name, size });
            }
        }

        // The root step expands both outputs from a single HKDF call
        let root_step = self.root_key + self.chain_key;
        if root_step > MAX_OUTPUT_LEN {
            return Err(CryptoError::InvalidKeySize {
                name: "root_key + chain_key",
                size: root_step,
            });
        }

        Ok(())
    }
}

impl Default for KeySizes {
    fn default() -> Self {
        Self::uniform(DEFAULT_KEY_SIZE)
    }
}

/// Key generation, agreement and derivation.
///
/// # Invariants
///
/// - `derive_root_keys` and `derive_chain_keys` are deterministic: identical
///   inputs produce identical outputs on both parties
/// - `create_diffie_hellman_shared_secret(pub_b, priv_a)` equals
///   `create_diffie_hellman_shared_secret(pub_a, priv_b)`
/// - Every returned key has the length given by [`KeyRepository::sizes`]
pub trait KeyRepository: Send + Sync {
    /// Configured key sizes.
    fn sizes(&self) -> &KeySizes;

    /// Generate a fresh key pair.
    fn generate_key_pair(&self) -> Result<AsymmetricKeyPair, CryptoError>;

    /// Compute the shared secret between our private key and their public key.
    fn create_diffie_hellman_shared_secret(
        &self,
        public_key: &PublicKey,
        private_key: &PrivateKey,
    ) -> Result<SharedSecret, CryptoError>;

    /// Root KDF step: mix a shared secret into the root key.
    ///
    /// Returns the next root key and a fresh chain key.
    fn derive_root_keys(
        &self,
        root_key: &RootKey,
        shared_secret: &SharedSecret,
    ) -> Result<(RootKey, ChainKey), CryptoError>;

    /// Chain KDF step.
    ///
    /// Returns the next chain key and the message key for the current step.
    fn derive_chain_keys(
        &self,
        chain_key: &ChainKey,
    ) -> Result<(ChainKey, MessageKey), CryptoError>;
}
