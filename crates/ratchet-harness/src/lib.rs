//! Deterministic simulation harness for the Double Ratchet engine.
//!
//! Seeded implementations of the engine's environment and a two-party world
//! for reproducible testing of reordering, replay and epoch changes.
//!
//! # Model-Based Testing
//!
//! The `model` module drives real engines with generated [`Operation`]
//! sequences. The sender's keys are the oracle for the receiver.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks behavioral properties against a
//! [`WorldSnapshot`]. Use [`InvariantRegistry::standard()`] for the ratchet
//! invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod model;
pub mod seeded_env;

pub use invariants::{
    CacheDrainsWhenQuiescent, DeliveryRecord, Invariant, InvariantRegistry, InvariantResult,
    KeyAgreement, NoEngineFailures, PartySnapshot, ReceiveCounterMonotonicity, ReplayRecord,
    ReplayRejection, Violation, WorldSnapshot,
};
pub use model::{
    Operation, Outcome, Party, PartyEngine, PartyId, SkipReason, SmallMessage, TwoPartyWorld,
};
pub use seeded_env::SeededEnv;
