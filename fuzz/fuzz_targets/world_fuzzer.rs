//! Fuzz target for two-party operation sequences
//!
//! Drives a `TwoPartyWorld` with fuzzer-chosen sends, out-of-order deliveries
//! and replays.
//!
//! # Invariants
//!
//! - Every standard invariant holds after every operation
//! - Draining the network empties every skipped-key cache

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ratchet_harness::{InvariantRegistry, Operation, TwoPartyWorld};

#[derive(Debug, Clone, Arbitrary)]
struct WorldScenario {
    seed: u64,
    operations: Vec<Operation>,
}

fuzz_target!(|scenario: WorldScenario| {
    let Ok(mut world) = TwoPartyWorld::new(scenario.seed) else {
        return;
    };
    let registry = InvariantRegistry::standard();

    for (i, op) in scenario.operations.iter().take(256).enumerate() {
        world.apply(op);
        registry.assert_all(&world.snapshot(), &format!("after operation {i} {op:?}"));
    }

    world.deliver_all();
    registry.assert_all(&world.snapshot(), "after draining");
});
