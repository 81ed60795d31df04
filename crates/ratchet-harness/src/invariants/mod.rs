//! Invariant checking for deterministic simulation testing.
//!
//! Invariants are properties that must always hold during execution. Unlike
//! example-based tests that check specific scenarios, invariants verify
//! behavioral properties across all operation sequences.
//!
//! # Architecture
//!
//! [`crate::TwoPartyWorld`] records its observable state into a
//! [`WorldSnapshot`], then registered [`Invariant`] checks run against it.
//!
//! # Usage
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! registry.check_all(&world.snapshot())?;
//! ```

mod checks;
mod snapshot;

use std::fmt;

pub use checks::{
    CacheDrainsWhenQuiescent, KeyAgreement, NoEngineFailures, ReceiveCounterMonotonicity,
    ReplayRejection,
};
pub use snapshot::{DeliveryRecord, PartySnapshot, ReplayRecord, WorldSnapshot};

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// An invariant that can be checked against a world snapshot.
pub trait Invariant: Send + Sync {
    /// Invariant name for error reporting.
    fn name(&self) -> &'static str;

    /// Check the invariant against the current state.
    fn check(&self, state: &WorldSnapshot) -> InvariantResult;
}

/// Registry of invariants to check.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Registry with every standard ratchet invariant.
    ///
    /// Includes:
    /// - [`KeyAgreement`]: receiver derives the sender's key
    /// - [`ReplayRejection`]: resolved keys are single use
    /// - [`ReceiveCounterMonotonicity`]: receive counters never decrease
    /// - [`CacheDrainsWhenQuiescent`]: no leftover skipped keys
    /// - [`NoEngineFailures`]: honest traffic never errors
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(KeyAgreement);
        registry.add(ReplayRejection);
        registry.add(ReceiveCounterMonotonicity);
        registry.add(CacheDrainsWhenQuiescent);
        registry.add(NoEngineFailures);
        registry
    }

    /// Add an invariant to the registry.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check all invariants against the given state.
    ///
    /// Returns `Ok(())` if all invariants hold, or all violations found.
    pub fn check_all(&self, state: &WorldSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Check all invariants, panicking on any violation.
    ///
    /// Use this in tests where you want immediate failure with context.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, state: &WorldSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("Invariant violation {context}:\n  {}", messages.join("\n  "));
        }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_has_invariants() {
        let registry = InvariantRegistry::standard();
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn empty_snapshot_passes_invariants() {
        let registry = InvariantRegistry::standard();
        assert!(registry.check_all(&WorldSnapshot::empty()).is_ok());
    }

    #[test]
    fn all_violations_are_reported() {
        let mut state = WorldSnapshot::empty();
        state.failures.push("boom".to_string());
        state.replays.push(ReplayRecord {
            to: crate::PartyId::Bob,
            message_number: 0,
            rejected: false,
        });

        let violations = InvariantRegistry::standard().check_all(&state).unwrap_err();
        let names: Vec<_> = violations.iter().map(|v| v.invariant).collect();
        assert_eq!(names, vec!["replay_rejection", "no_engine_failures"]);
    }
}
