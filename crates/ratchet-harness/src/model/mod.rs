//! Model-based testing against real engines.
//!
//! A [`TwoPartyWorld`] holds two real engines joined by in-flight queues. The
//! oracle is the sender itself: every key it derives is remembered and must
//! be reproduced by the receiver, in whatever order delivery happens.

mod operation;
mod world;

pub use operation::{Operation, Outcome, PartyId, SkipReason, SmallMessage};
pub use world::{Party, PartyEngine, TwoPartyWorld};
