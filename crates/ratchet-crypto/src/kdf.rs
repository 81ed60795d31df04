//! HKDF-SHA512 derivation used by the ratchet
//!
//! Both KDF steps are HKDF with the key being advanced as input keying
//! material and the mixing parameter as salt:
//!
//! - root step: `HKDF(ikm = root_key, salt = shared_secret)`, output split
//!   into the next root key followed by the new chain key
//! - chain step: `HKDF(ikm = chain_key, salt = 0x01)` is the message key,
//!   `HKDF(ikm = chain_key, salt = 0x02)` is the next chain key

use hkdf::Hkdf;
use sha2::Sha512;

use crate::error::CryptoError;

/// Largest output HKDF-SHA512 can expand to (255 blocks of 64 bytes).
pub const MAX_OUTPUT_LEN: usize = 255 * 64;

/// Salt selecting the message key in the chain step.
pub const MESSAGE_KEY_SALT: &[u8] = &[0x01];

/// Salt selecting the next chain key in the chain step.
pub const CHAIN_KEY_SALT: &[u8] = &[0x02];

/// Info label used when resizing a raw Diffie-Hellman output.
const SHARED_SECRET_LABEL: &[u8] = b"DoubleRatchetSharedSecretV1";

/// Expand `ikm` under `salt` to exactly `len` bytes.
pub fn derive(ikm: &[u8], salt: &[u8], len: usize) -> Result<Vec<u8>, CryptoError> {
    let hkdf = Hkdf::<Sha512>::new(Some(salt), ikm);

    let mut okm = vec![0u8; len];
    hkdf.expand(&[], &mut okm)
        .map_err(|_| CryptoError::InvalidKeySize { name: "hkdf output", size: len })?;
    Ok(okm)
}

/// Root step output as `(root, chain)` byte buffers.
pub fn derive_root(
    root_key: &[u8],
    shared_secret: &[u8],
    root_len: usize,
    chain_len: usize,
) -> Result<(Vec<u8>, Vec<u8>), CryptoError> {
    let mut okm = derive(root_key, shared_secret, root_len + chain_len)?;
    let chain = okm.split_off(root_len);
    Ok((okm, chain))
}

/// Chain step output as `(chain, message)` byte buffers.
pub fn derive_chain(
    chain_key: &[u8],
    chain_len: usize,
    message_len: usize,
) -> Result<(Vec<u8>, Vec<u8>), CryptoError> {
    let message = derive(chain_key, MESSAGE_KEY_SALT, message_len)?;
    let chain = derive(chain_key, CHAIN_KEY_SALT, chain_len)?;
    Ok((chain, message))
}

/// Stretch or compress a raw Diffie-Hellman output to `len` bytes.
pub fn resize_shared_secret(dh_output: &[u8], len: usize) -> Result<Vec<u8>, CryptoError> {
    let hkdf = Hkdf::<Sha512>::new(None, dh_output);

    let mut okm = vec![0u8; len];
    hkdf.expand(SHARED_SECRET_LABEL, &mut okm)
        .map_err(|_| CryptoError::InvalidKeySize { name: "shared_secret", size: len })?;
    Ok(okm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_deterministic() {
        let a = derive(b"input key material", b"salt", 32).unwrap();
        let b = derive(b"input key material", b"salt", 32).unwrap();

        assert_eq!(a, b, "same inputs must produce same output");
    }

    #[test]
    fn different_salts_produce_different_output() {
        let a = derive(b"chain", MESSAGE_KEY_SALT, 32).unwrap();
        let b = derive(b"chain", CHAIN_KEY_SALT, 32).unwrap();

        assert_ne!(a, b);
    }

    #[test]
    fn root_split_is_prefix_then_suffix() {
        let okm = derive(b"root", b"shared", 64).unwrap();
        let (root, chain) = derive_root(b"root", b"shared", 32, 32).unwrap();

        assert_eq!(root.as_slice(), &okm[..32]);
        assert_eq!(chain.as_slice(), &okm[32..]);
    }

    #[test]
    fn chain_step_respects_sizes() {
        let (chain, message) = derive_chain(&[1; 32], 48, 16).unwrap();

        assert_eq!(chain.len(), 48);
        assert_eq!(message.len(), 16);
    }

    #[test]
    fn oversized_output_is_rejected() {
        let result = derive(b"ikm", b"salt", MAX_OUTPUT_LEN + 1);

        assert!(matches!(result, Err(CryptoError::InvalidKeySize { .. })));
    }

    #[test]
    fn works_with_empty_input() {
        // Edge case: empty input should still produce valid output
        let okm = derive(&[], &[], 32).unwrap();
        assert_eq!(okm.len(), 32);
    }

    #[test]
    fn resize_changes_length_only_through_hkdf() {
        let dh = [7u8; 32];
        let stretched = resize_shared_secret(&dh, 64).unwrap();

        assert_eq!(stretched.len(), 64);
        assert_ne!(&stretched[..32], &dh[..]);
    }
}
