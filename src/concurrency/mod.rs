//! Concurrency building blocks for the Pregel engine.
//!
//! Important: nothing in here takes a lock. Shared state between workers is
//! either partition-disjoint or goes through the atomic huge arrays; the only
//! blocking point of a run is the superstep barrier in the executor.

pub mod atomic;
pub mod termination;

pub use termination::{TerminationFlag, TerminationSignal};
