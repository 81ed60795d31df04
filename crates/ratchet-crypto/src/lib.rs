//! Double Ratchet Cryptographic Primitives
//!
//! Key types and the cryptographic capability consumed by the ratchet
//! engine. The engine never touches a curve or a hash function directly; it
//! only calls a [`KeyRepository`].
//!
//! # Key Lifecycle
//!
//! A conversation starts from a pre-shared salt that seeds the first root key.
//! Every Diffie-Hellman step mixes a fresh shared secret into the root key and
//! yields a new chain key. Each chain step yields one message key.
//!
//! ```text
//! Shared Salt ──► Root Key
//!                    │
//!                    ▼  KDF_RK(root, DH(pub, priv))
//!               Root Key' + Chain Key
//!                               │
//!                               ▼  KDF_CK(chain)
//!                          Chain Key' + Message Key
//!                                             │
//!                                             ▼
//!                                 AEAD Encryption → Ciphertext
//! ```
//!
//! # Security
//!
//! Forward Secrecy:
//! - Chain keys are replaced on every message and the old buffer is wiped
//! - Message keys are single use and wiped when dropped
//!
//! Post-Compromise Security:
//! - Every new epoch mixes a fresh X25519 shared secret into the root key
//!
//! Memory hygiene:
//! - Every key type owns a [`Secret`] that is zeroized on drop
//! - `Debug` output never contains key bytes
//! - Equality is computed in constant time

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod aead;
pub mod error;
pub mod kdf;
pub mod keys;
pub mod repository;
pub mod rng;
pub mod secret;
pub mod x25519;

pub use aead::{NONCE_SIZE, SealedMessage, open_message, seal_message};
pub use error::CryptoError;
pub use keys::{
    AsymmetricKeyPair, ChainKey, MessageKey, PrivateKey, PublicKey, RootKey, SharedSecret,
};
pub use repository::{KeyRepository, KeySizes};
pub use rng::{Rng, RngError};
pub use secret::Secret;
pub use x25519::X25519KeyRepository;
