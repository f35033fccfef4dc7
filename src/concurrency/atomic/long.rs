//! Huge array of atomic `i64` cells.

use core::sync::atomic::{AtomicI64, Ordering};

use crossbeam_utils::Backoff;

use super::pages::AtomicPages;
use crate::collections::huge::MemoryBudget;
use crate::error::Result;

/// A `u64`-indexed array of `AtomicI64`, safe to read and write from many threads.
///
/// Operations on different indices never block each other. Writers on the same
/// index race through compare-and-swap; [`Self::update`] packages the
/// read/compute/CAS/retry loop.
pub struct HugeAtomicLongArray {
    cells: AtomicPages<AtomicI64>,
}

impl HugeAtomicLongArray {
    /// Allocates `size` cells set to `0`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Allocation`] if the host refuses the pages.
    pub fn new(size: u64) -> Result<Self> {
        Self::with_budget(size, &MemoryBudget::unlimited())
    }

    /// Allocates `size` zeroed cells if the estimate fits `budget`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Allocation`] if the estimate exceeds the budget.
    pub fn with_budget(size: u64, budget: &MemoryBudget) -> Result<Self> {
        Ok(Self {
            cells: AtomicPages::new(size, budget, || AtomicI64::new(0))?,
        })
    }

    /// Estimated bytes for `size` cells.
    pub fn memory_estimation(size: u64) -> u64 {
        AtomicPages::<AtomicI64>::memory_estimation(size)
    }

    /// Number of cells.
    #[inline(always)]
    pub fn len(&self) -> u64 {
        self.cells.len()
    }

    /// Returns `true` if the array holds no cells.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.cells.len() == 0
    }

    /// Loads cell `index`.
    ///
    /// # Panics
    /// Panics if `index >= len()`.
    #[inline]
    pub fn get(&self, index: u64) -> i64 {
        self.cells.cell(index).load(Ordering::Acquire)
    }

    /// Stores `value` into cell `index`.
    ///
    /// # Panics
    /// Panics if `index >= len()`.
    #[inline]
    pub fn set(&self, index: u64, value: i64) {
        self.cells.cell(index).store(value, Ordering::Release);
    }

    /// Adds `delta` to cell `index`, returning the previous value.
    ///
    /// # Panics
    /// Panics if `index >= len()`.
    #[inline]
    pub fn get_and_add(&self, index: u64, delta: i64) -> i64 {
        self.cells.cell(index).fetch_add(delta, Ordering::AcqRel)
    }

    /// Adds `delta` to cell `index`.
    ///
    /// # Panics
    /// Panics if `index >= len()`.
    #[inline]
    pub fn add_to(&self, index: u64, delta: i64) {
        self.get_and_add(index, delta);
    }

    /// Stores `new` if cell `index` holds `expected`; returns whether it did.
    ///
    /// # Panics
    /// Panics if `index >= len()`.
    #[inline]
    pub fn compare_and_set(&self, index: u64, expected: i64, new: i64) -> bool {
        self.compare_exchange(index, expected, new).is_ok()
    }

    /// Like [`Self::compare_and_set`], returning the witnessed value on failure.
    ///
    /// # Panics
    /// Panics if `index >= len()`.
    #[inline]
    pub fn compare_exchange(&self, index: u64, expected: i64, new: i64) -> core::result::Result<i64, i64> {
        self.cells
            .cell(index)
            .compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire)
    }

    /// Replaces cell `index` with `f(current)` using a CAS-retry loop.
    ///
    /// `f` may run more than once under contention. Returns the value written.
    ///
    /// # Panics
    /// Panics if `index >= len()`.
    pub fn update(&self, index: u64, mut f: impl FnMut(i64) -> i64) -> i64 {
        let cell = self.cells.cell(index);
        let backoff = Backoff::new();
        let mut current = cell.load(Ordering::Acquire);
        loop {
            let next = f(current);
            match cell.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return next,
                Err(witness) => {
                    current = witness;
                    backoff.spin();
                }
            }
        }
    }

    /// Stores `value` into every cell.
    pub fn fill(&self, value: i64) {
        for cell in self.cells.cells() {
            cell.store(value, Ordering::Relaxed);
        }
    }
}
