//! Message sealing with `XChaCha20-Poly1305`
//!
//! All functions are pure: the nonce is provided by the caller. Message keys
//! are single use, so a nonce never repeats under the same key as long as the
//! caller does not reuse a key.

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit, Payload},
};

use crate::{error::CryptoError, keys::MessageKey};

/// `XChaCha20` nonce size (24 bytes)
pub const NONCE_SIZE: usize = 24;

/// Required message key size for this cipher
const CIPHER_KEY_SIZE: usize = 32;

/// Poly1305 tag size (16 bytes)
const POLY1305_TAG_SIZE: usize = 16;

/// Ciphertext plus the nonce it was sealed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedMessage {
    /// The 24-byte `XChaCha20` nonce
    pub nonce: [u8; NONCE_SIZE],
    /// The ciphertext including 16-byte Poly1305 tag
    pub ciphertext: Vec<u8>,
}

impl SealedMessage {
    /// Plaintext length (ciphertext length minus authentication tag).
    pub fn plaintext_len(&self) -> usize {
        self.ciphertext.len().saturating_sub(POLY1305_TAG_SIZE)
    }
}

/// Encrypt `plaintext` under a message key.
///
/// `associated_data` is authenticated but not encrypted. Callers usually bind
/// the message header here so a header cannot be swapped onto another
/// ciphertext.
///
/// # Errors
///
/// - `InvalidKeyLength` if the repository was configured with a message key
///   size other than 32 bytes
pub fn seal_message(
    plaintext: &[u8],
    message_key: &MessageKey,
    associated_data: &[u8],
    nonce: [u8; NONCE_SIZE],
) -> Result<SealedMessage, CryptoError> {
    let cipher = cipher(message_key)?;

    let payload = Payload { msg: plaintext, aad: associated_data };
    let Ok(ciphertext) = cipher.encrypt(XNonce::from_slice(&nonce), payload) else {
        unreachable!("XChaCha20-Poly1305 encryption cannot fail with valid inputs");
    };

    Ok(SealedMessage { nonce, ciphertext })
}

/// Decrypt a sealed message.
///
/// # Errors
///
/// - `DecryptionFailed` if the key, nonce, associated data or ciphertext
///   do not match
/// - `InvalidKeyLength` for a message key that is not 32 bytes
pub fn open_message(
    sealed: &SealedMessage,
    message_key: &MessageKey,
    associated_data: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = cipher(message_key)?;

    let payload = Payload { msg: sealed.ciphertext.as_slice(), aad: associated_data };
    cipher
        .decrypt(XNonce::from_slice(&sealed.nonce), payload)
        .map_err(|_| CryptoError::DecryptionFailed)
}

fn cipher(message_key: &MessageKey) -> Result<XChaCha20Poly1305, CryptoError> {
    XChaCha20Poly1305::new_from_slice(message_key.as_bytes()).map_err(|_| {
        CryptoError::InvalidKeyLength { expected: CIPHER_KEY_SIZE, actual: message_key.len() }
    })
}
