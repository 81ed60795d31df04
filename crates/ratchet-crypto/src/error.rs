//! Error types for cryptographic operations

use thiserror::Error;

use crate::rng::RngError;

/// Errors from key generation, agreement, derivation and sealing.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key material handed to the repository has the wrong length
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Length the operation requires
        expected: usize,
        /// Length that was supplied
        actual: usize,
    },

    /// A configured key size cannot be produced by the KDF
    #[error("invalid key size for {name}: {size} bytes")]
    InvalidKeySize {
        /// Which size in [`crate::KeySizes`] is invalid
        name: &'static str,
        /// The rejected size
        size: usize,
    },

    /// The peer's public key produced an all-zero shared secret
    ///
    /// Happens with low-order points. The peer is either broken or hostile.
    #[error("diffie-hellman output is not contributory")]
    NonContributory,

    /// AEAD authentication failed (wrong key, nonce or tampered ciphertext)
    #[error("decryption failed")]
    DecryptionFailed,

    /// Random number generation failed
    #[error("rng failure: {0}")]
    Rng(#[from] RngError),
}

impl CryptoError {
    /// Returns true if this error is fatal (unrecoverable)
    ///
    /// Fatal errors are protocol violations or misconfiguration. Only RNG
    /// failures may succeed when retried.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::InvalidKeyLength { .. } => true,
            Self::InvalidKeySize { .. } => true,
            Self::NonContributory => true,
            Self::DecryptionFailed => true,

            Self::Rng(_) => false,
        }
    }
}
