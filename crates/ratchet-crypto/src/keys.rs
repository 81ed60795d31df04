//! Typed key wrappers.
//!
//! Each key is a distinct type so a chain key can never be passed where a
//! root key is expected. All of them own a [`Secret`] and are wiped on drop.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::secret::Secret;

macro_rules! key_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Secret);

        impl $name {
            /// Take ownership of `bytes`.
            pub fn from_vec(bytes: Vec<u8>) -> Self {
                Self(Secret::from_vec(bytes))
            }

            /// Copy `bytes` into a new key.
            pub fn from_slice(bytes: &[u8]) -> Self {
                Self(Secret::from_slice(bytes))
            }

            /// Raw key bytes.
            pub fn as_bytes(&self) -> &[u8] {
                self.0.as_bytes()
            }

            /// Key length in bytes.
            pub fn len(&self) -> usize {
                self.0.len()
            }

            /// True if the key holds no bytes.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }
    };
}

macro_rules! redacted_debug {
    ($($name:ident),+) => {
        $(
            impl fmt::Debug for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.debug_tuple(stringify!($name)).field(&"***").finish()
                }
            }
        )+
    };
}

key_type!(
    /// Root key, advanced only by a Diffie-Hellman ratchet step.
    RootKey
);

key_type!(
    /// Chain key, advanced on every message of an epoch.
    ChainKey
);

key_type!(
    /// Single-use key for one message.
    MessageKey
);

key_type!(
    /// Diffie-Hellman output, or the pre-shared salt seeding a conversation.
    SharedSecret
);

key_type!(
    /// Private half of an asymmetric key pair.
    PrivateKey
);

key_type!(
    /// Public half of an asymmetric key pair.
    ///
    /// Not secret, but still wiped on drop since it identifies the epoch a
    /// conversation is in.
    PublicKey
);

redacted_debug!(RootKey, ChainKey, MessageKey, SharedSecret, PrivateKey);

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey(")?;
        for byte in self.as_bytes() {
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}

impl RootKey {
    /// Seed a root key from the pre-shared salt.
    pub fn from_shared_salt(salt: &SharedSecret) -> Self {
        Self::from_slice(salt.as_bytes())
    }
}

/// A party's key pair. The private half is wiped when the pair is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsymmetricKeyPair {
    /// Published to the peer in every message header.
    pub public_key: PublicKey,
    /// Used for the next Diffie-Hellman step.
    pub private_key: PrivateKey,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_keys_redact_debug() {
        let key = ChainKey::from_slice(&[0x42; 32]);
        assert_eq!(format!("{key:?}"), "ChainKey(\"***\")");
    }

    #[test]
    fn public_key_debug_is_hex() {
        let key = PublicKey::from_slice(&[0x00, 0xAB, 0x10]);
        assert_eq!(format!("{key:?}"), "PublicKey(00ab10)");
    }

    #[test]
    fn root_key_from_salt_copies_bytes() {
        let salt = SharedSecret::from_slice(&[5; 32]);
        let root = RootKey::from_shared_salt(&salt);

        assert_eq!(root.as_bytes(), salt.as_bytes());
    }

    #[test]
    fn key_pair_debug_hides_private_half() {
        let pair = AsymmetricKeyPair {
            public_key: PublicKey::from_slice(&[1; 4]),
            private_key: PrivateKey::from_slice(&[0xEE; 4]),
        };
        let rendered = format!("{pair:?}");

        assert!(rendered.contains("01010101"));
        assert!(!rendered.contains("ee"));
    }

    #[test]
    fn message_key_cbor_roundtrip() {
        let key = MessageKey::from_slice(&[3; 32]);
        let mut bytes = Vec::new();
        ciborium::into_writer(&key, &mut bytes).unwrap();
        let decoded: MessageKey = ciborium::from_reader(bytes.as_slice()).unwrap();

        assert_eq!(key, decoded);
    }
}
