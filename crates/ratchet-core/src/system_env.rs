//! Production Environment implementation using the OS RNG.

use crate::env::Environment;

/// Production environment backed by getrandom.
///
/// # Security
///
/// getrandom provides OS-level cryptographic randomness (e.g., /dev/urandom
/// on Linux, `BCryptGenRandom` on Windows).
///
/// # Panics
///
/// Panics if the OS RNG fails. Conversation identifiers generated without
/// working entropy could collide with live conversations, and the failure
/// indicates an OS-level problem the engine cannot recover from.
#[derive(Debug, Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }
}
