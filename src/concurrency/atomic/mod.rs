//! Lock-free huge arrays for state shared across worker threads.
//!
//! Same paged addressing as [`crate::collections::huge::HugeArray`], but every
//! cell is a hardware atomic accessed through `&self`:
//! - readers and writers on different indices never block each other;
//! - writers on the same index race through compare-and-swap;
//! - accumulation uses a read / compute / CAS / retry loop (`update`, `add_to`).
//!
//! Important:
//! - This does **not** make concurrent mutation “free”. Atomic RMW operations have
//!   inherent hardware cost, and hot indices serialize on one cache line.

/// Paged atomic bit set.
pub mod bitset;
/// Paged atomic `f64` array.
pub mod double;
/// Paged atomic `i64` array.
pub mod long;

mod pages;

#[cfg(test)]
mod tests;

pub use bitset::HugeAtomicBitSet;
pub use double::HugeAtomicDoubleArray;
pub use long::HugeAtomicLongArray;
