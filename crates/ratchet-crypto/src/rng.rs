//! Cryptographically secure RNG backed by `ChaCha20`.

#![allow(clippy::disallowed_types, reason = "Locking RNG state only")]

use std::sync::Mutex;

use rand_chacha::{
    ChaCha20Rng,
    rand_core::{RngCore, SeedableRng},
};
use thiserror::Error;

/// `ChaCha20` CSPRNG shared behind a mutex.
///
/// Production code seeds it from the OS with [`Rng::from_os_entropy`]. Tests
/// use [`Rng::from_seed`] so that generated key pairs are reproducible.
#[derive(Debug)]
pub struct Rng {
    rng: Mutex<ChaCha20Rng>,
}

impl Rng {
    /// Seed from operating system entropy.
    pub fn from_os_entropy() -> Result<Self, RngError> {
        let mut seed = [0u8; 32];
        getrandom::fill(&mut seed).map_err(|_| RngError::NotEnoughRandomness)?;
        let rng = Self::from_seed(seed);
        zeroize::Zeroize::zeroize(&mut seed);
        Ok(rng)
    }

    /// Deterministic generator for tests and simulation.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self { rng: Mutex::new(ChaCha20Rng::from_seed(seed)) }
    }

    /// Fill a fixed-size array with random bytes.
    pub fn random_array<const N: usize>(&self) -> Result<[u8; N], RngError> {
        let mut out = [0u8; N];
        self.fill(&mut out)?;
        Ok(out)
    }

    /// Allocate `len` random bytes.
    pub fn random_vec(&self, len: usize) -> Result<Vec<u8>, RngError> {
        let mut out = vec![0u8; len];
        self.fill(&mut out)?;
        Ok(out)
    }

    fn fill(&self, out: &mut [u8]) -> Result<(), RngError> {
        let mut rng = self.rng.lock().map_err(|_| RngError::LockPoisoned)?;
        rng.try_fill_bytes(out).map_err(|_| RngError::NotEnoughRandomness)
    }
}

/// Errors from [`Rng`].
#[derive(Debug, Error)]
pub enum RngError {
    /// Another thread panicked while holding the generator
    #[error("rng lock is poisoned")]
    LockPoisoned,

    /// Entropy source failed
    #[error("unable to collect enough randomness")]
    NotEnoughRandomness,
}
