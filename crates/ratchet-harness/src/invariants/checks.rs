//! Standard invariant checks.
//!
//! These invariants capture properties that must hold after any operation
//! sequence, not specific scenarios.

use super::{Invariant, InvariantResult, Violation, WorldSnapshot};

/// Every delivered message resolves to the sender's key and opens to the
/// sender's plaintext.
pub struct KeyAgreement;

impl Invariant for KeyAgreement {
    fn name(&self) -> &'static str {
        "key_agreement"
    }

    fn check(&self, state: &WorldSnapshot) -> InvariantResult {
        for record in &state.deliveries {
            if !record.keys_match || !record.plaintext_matches {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "{} message {}: keys_match={} plaintext_matches={}",
                        record.to.name(),
                        record.message_number,
                        record.keys_match,
                        record.plaintext_matches
                    ),
                });
            }
        }
        Ok(())
    }
}

/// A message that was already resolved is never resolved again.
pub struct ReplayRejection;

impl Invariant for ReplayRejection {
    fn name(&self) -> &'static str {
        "replay_rejection"
    }

    fn check(&self, state: &WorldSnapshot) -> InvariantResult {
        match state.replays.iter().find(|record| !record.rejected) {
            Some(record) => Err(Violation {
                invariant: self.name(),
                message: format!(
                    "{} accepted replay of message {}",
                    record.to.name(),
                    record.message_number
                ),
            }),
            None => Ok(()),
        }
    }
}

/// `received_last_message_number` never decreases.
pub struct ReceiveCounterMonotonicity;

impl Invariant for ReceiveCounterMonotonicity {
    fn name(&self) -> &'static str {
        "receive_counter_monotonicity"
    }

    fn check(&self, state: &WorldSnapshot) -> InvariantResult {
        for party in &state.parties {
            for window in party.received_last_history.windows(2) {
                if window[1] < window[0] {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "{}: received_last went {:?} → {:?}",
                            party.party.name(),
                            window[0],
                            window[1]
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Once nothing is in flight, no skipped key is left in any cache.
pub struct CacheDrainsWhenQuiescent;

impl Invariant for CacheDrainsWhenQuiescent {
    fn name(&self) -> &'static str {
        "cache_drains_when_quiescent"
    }

    fn check(&self, state: &WorldSnapshot) -> InvariantResult {
        if !state.is_quiescent() {
            return Ok(());
        }

        match state.parties.iter().find(|party| party.cached_keys > 0) {
            Some(party) => Err(Violation {
                invariant: self.name(),
                message: format!(
                    "{} holds {} cached keys with nothing in flight",
                    party.party.name(),
                    party.cached_keys
                ),
            }),
            None => Ok(()),
        }
    }
}

/// Honest traffic never makes the engine fail.
pub struct NoEngineFailures;

impl Invariant for NoEngineFailures {
    fn name(&self) -> &'static str {
        "no_engine_failures"
    }

    fn check(&self, state: &WorldSnapshot) -> InvariantResult {
        match state.failures.first() {
            Some(failure) => Err(Violation { invariant: self.name(), message: failure.clone() }),
            None => Ok(()),
        }
    }
}
