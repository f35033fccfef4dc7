//! Storage for node-indexed state.
//!
//! `huge` holds the paged, `u64`-indexed arrays every other layer builds on.

pub mod huge;

pub use huge::{HugeArray, HugeCursor, MemoryBudget, PageLayout};
