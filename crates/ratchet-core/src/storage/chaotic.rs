//! Chaotic storage wrapper for fault injection testing
//!
//! Randomly fails operations before they reach the wrapped datasource, which
//! models a crash between two writes. Used to check that every persisted
//! catch-up step is a resumable checkpoint.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::sync::{Arc, Mutex};

use ratchet_crypto::MessageKey;

use super::{LocalDatasource, StorageError};
use crate::conversation::{Conversation, ConversationId};

/// Chaotic storage wrapper that randomly injects failures
///
/// A failed call never reaches the inner datasource, so a failed write leaves
/// no trace. Uses Arc<Mutex<>> for the RNG state, making it Clone and
/// thread-safe.
#[derive(Clone)]
pub struct ChaoticStorage<S: LocalDatasource> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    /// RNG state for deterministic chaos
    rng: Arc<Mutex<ChaoticRng>>,
    /// Operation counter
    operation_count: Arc<Mutex<usize>>,
}

/// Simple deterministic RNG for chaos injection
///
/// Linear congruential generator: fast, and reproducible with the same seed.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Generate next random value [0.0, 1.0)
    fn next(&mut self) -> f64 {
        // LCG constants from Numerical Recipes
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }

    fn should_fail(&mut self, failure_rate: f64) -> bool {
        self.next() < failure_rate
    }
}

impl<S: LocalDatasource> ChaoticStorage<S> {
    /// Create a new chaotic storage wrapper
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Create with explicit seed for reproducible chaos
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    #[allow(clippy::panic)]
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            rng: Arc::new(Mutex::new(ChaoticRng::new(seed))),
            operation_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Underlying storage (for checking invariants after chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Total number of storage operations attempted.
    pub fn operation_count(&self) -> usize {
        #[allow(clippy::expect_used)]
        *self.operation_count.lock().expect("operation_count mutex poisoned")
    }

    /// Count the operation and decide whether it fails.
    #[allow(clippy::expect_used)]
    fn inject(&self) -> Result<(), StorageError> {
        *self.operation_count.lock().expect("operation_count mutex poisoned") += 1;

        let mut rng = self.rng.lock().expect("ChaoticRng mutex poisoned");
        let fail = rng.should_fail(self.failure_rate);
        if fail {
            return Err(StorageError::Io("chaotic failure injection".to_string()));
        }
        Ok(())
    }
}

impl<S: LocalDatasource> LocalDatasource for ChaoticStorage<S> {
    fn save_or_update_conversation(&self, conversation: &Conversation) -> Result<(), StorageError> {
        self.inject()?;
        self.inner.save_or_update_conversation(conversation)
    }

    fn get_conversation(&self, id: ConversationId) -> Result<Option<Conversation>, StorageError> {
        self.inject()?;
        self.inner.get_conversation(id)
    }

    fn save_message_key(&self, id: &str, key: &MessageKey) -> Result<(), StorageError> {
        self.inject()?;
        self.inner.save_message_key(id, key)
    }

    fn pop_message_key(&self, id: &str) -> Result<Option<MessageKey>, StorageError> {
        self.inject()?;
        self.inner.pop_message_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn key(byte: u8) -> MessageKey {
        MessageKey::from_slice(&[byte; 32])
    }

    #[test]
    fn test_chaotic_with_zero_failure_rate() {
        let chaotic = ChaoticStorage::new(MemoryStorage::new(), 0.0);

        // With 0% failure rate, should always succeed
        for i in 0..100u8 {
            chaotic
                .save_message_key(&format!("c - {i}"), &key(i))
                .expect("should not fail with 0% rate");
        }

        assert_eq!(chaotic.inner().message_key_count(), 100);
        assert_eq!(chaotic.operation_count(), 100);
    }

    #[test]
    fn test_chaotic_with_100_failure_rate() {
        let chaotic = ChaoticStorage::new(MemoryStorage::new(), 1.0);

        // With 100% failure rate, should always fail
        assert!(chaotic.save_message_key("c - 0", &key(0)).is_err());
        assert!(chaotic.pop_message_key("c - 0").is_err());
        assert!(chaotic.get_conversation(ConversationId::from_u128(1)).is_err());
    }

    #[test]
    fn test_failed_write_never_reaches_inner() {
        let chaotic = ChaoticStorage::new(MemoryStorage::new(), 1.0);

        let _ = chaotic.save_message_key("c - 0", &key(0));

        assert_eq!(chaotic.inner().message_key_count(), 0);
    }

    #[test]
    fn test_chaotic_deterministic_with_seed() {
        let chaotic1 = ChaoticStorage::with_seed(MemoryStorage::new(), 0.5, 42);
        let chaotic2 = ChaoticStorage::with_seed(MemoryStorage::new(), 0.5, 42);

        // Same seed should produce same failure pattern
        for i in 0..100u8 {
            let id = format!("c - {i}");
            let result1 = chaotic1.save_message_key(&id, &key(i));
            let result2 = chaotic2.save_message_key(&id, &key(i));

            assert_eq!(result1.is_ok(), result2.is_ok(), "determinism violated at iteration {i}");
        }
    }

    #[test]
    #[should_panic(expected = "failure_rate must be between 0.0 and 1.0")]
    fn test_chaotic_rejects_invalid_failure_rate() {
        let _chaotic = ChaoticStorage::new(MemoryStorage::new(), 1.5); // Invalid!
    }
}
