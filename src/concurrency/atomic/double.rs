//! Huge array of atomic `f64` cells, stored as raw bits in `AtomicU64`.

use core::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::Backoff;

use super::pages::AtomicPages;
use crate::collections::huge::MemoryBudget;
use crate::error::Result;

/// A `u64`-indexed array of atomic doubles.
///
/// Hardware has no atomic float add, so [`Self::add_to`] and [`Self::update`]
/// are CAS-retry loops over the bit pattern. `compare_and_set` compares bit
/// patterns, so `-0.0` and `0.0` are distinct and a stored `NaN` matches
/// itself.
pub struct HugeAtomicDoubleArray {
    cells: AtomicPages<AtomicU64>,
}

impl HugeAtomicDoubleArray {
    /// Allocates `size` cells set to `0.0`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Allocation`] if the host refuses the pages.
    pub fn new(size: u64) -> Result<Self> {
        Self::with_budget(size, &MemoryBudget::unlimited(), 0.0)
    }

    /// Allocates `size` cells set to `initial` if the estimate fits `budget`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Allocation`] if the estimate exceeds the budget.
    pub fn with_budget(size: u64, budget: &MemoryBudget, initial: f64) -> Result<Self> {
        let bits = initial.to_bits();
        Ok(Self {
            cells: AtomicPages::new(size, budget, || AtomicU64::new(bits))?,
        })
    }

    /// Estimated bytes for `size` cells.
    pub fn memory_estimation(size: u64) -> u64 {
        AtomicPages::<AtomicU64>::memory_estimation(size)
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
    pub fn get(&self, index: u64) -> f64 {
        f64::from_bits(self.cells.cell(index).load(Ordering::Acquire))
    }

    /// Stores `value` into cell `index`.
    ///
    /// # Panics
    /// Panics if `index >= len()`.
    #[inline]
    pub fn set(&self, index: u64, value: f64) {
        self.cells.cell(index).store(value.to_bits(), Ordering::Release);
    }

    /// Stores `new` if cell `index` holds exactly `expected`; returns whether it did.
    ///
    /// # Panics
    /// Panics if `index >= len()`.
    #[inline]
    pub fn compare_and_set(&self, index: u64, expected: f64, new: f64) -> bool {
        self.compare_exchange(index, expected, new).is_ok()
    }

    /// Like [`Self::compare_and_set`], returning the witnessed value on failure.
    ///
    /// # Panics
    /// Panics if `index >= len()`.
    #[inline]
    pub fn compare_exchange(&self, index: u64, expected: f64, new: f64) -> core::result::Result<f64, f64> {
        self.cells
            .cell(index)
            .compare_exchange(
                expected.to_bits(),
                new.to_bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(f64::from_bits)
            .map_err(f64::from_bits)
    }

    /// Adds `delta` to cell `index`, returning the previous value.
    ///
    /// # Panics
    /// Panics if `index >= len()`.
    pub fn get_and_add(&self, index: u64, delta: f64) -> f64 {
        let mut previous = 0.0;
        self.update(index, |current| {
            previous = current;
            current + delta
        });
        previous
    }

    /// Adds `delta` to cell `index`.
    ///
    /// # Panics
    /// Panics if `index >= len()`.
    #[inline]
    pub fn add_to(&self, index: u64, delta: f64) {
        self.update(index, |current| current + delta);
    }

    /// Replaces cell `index` with `f(current)` using a CAS-retry loop.
    ///
    /// `f` may run more than once under contention. Returns the value written.
    ///
    /// # Panics
    /// Panics if `index >= len()`.
    pub fn update(&self, index: u64, mut f: impl FnMut(f64) -> f64) -> f64 {
        let cell = self.cells.cell(index);
        let backoff = Backoff::new();
        let mut current = cell.load(Ordering::Acquire);
        loop {
            let next = f(f64::from_bits(current));
            match cell.compare_exchange_weak(
                current,
                next.to_bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return next,
                Err(witness) => {
                    current = witness;
                    backoff.spin();
                }
            }
        }
    }

    /// Stores `value` into every cell.
    pub fn fill(&self, value: f64) {
        let bits = value.to_bits();
        for cell in self.cells.cells() {
            cell.store(bits, Ordering::Relaxed);
        }
    }
}
