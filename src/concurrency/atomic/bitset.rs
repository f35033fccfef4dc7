//! Huge atomic bit set.
//!
//! Dense alternative to one `AtomicBool` per node; used for vote-to-halt bits
//! and "received a message" markers. Bits of neighboring nodes share a word, so
//! every write is an atomic RMW even when callers own disjoint node ranges.

use core::sync::atomic::{AtomicU64, Ordering};

use super::pages::AtomicPages;
use crate::collections::huge::MemoryBudget;
use crate::error::Result;

/// A `u64`-indexed, word-packed atomic bit set.
pub struct HugeAtomicBitSet {
    num_bits: u64,
    words: AtomicPages<AtomicU64>,
}

impl HugeAtomicBitSet {
    /// Creates a bit set of `num_bits` bits, all cleared.
    ///
    /// # Errors
    /// Returns [`crate::Error::Allocation`] if the host refuses the pages.
    pub fn new(num_bits: u64) -> Result<Self> {
        Self::with_budget(num_bits, &MemoryBudget::unlimited())
    }

    /// Creates a cleared bit set if the estimate fits `budget`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Allocation`] if the estimate exceeds the budget.
    pub fn with_budget(num_bits: u64, budget: &MemoryBudget) -> Result<Self> {
        Ok(Self {
            num_bits,
            words: AtomicPages::new(num_words(num_bits), budget, || AtomicU64::new(0))?,
        })
    }

    /// Estimated bytes for `num_bits` bits.
    pub fn memory_estimation(num_bits: u64) -> u64 {
        AtomicPages::<AtomicU64>::memory_estimation(num_words(num_bits))
    }

    /// Number of bits.
    #[inline(always)]
    pub fn len(&self) -> u64 {
        self.num_bits
    }

    /// Returns `true` if the set has zero bits.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.num_bits == 0
    }

    /// Returns whether `index` is set.
    ///
    /// # Panics
    /// Panics if `index >= len()`.
    #[inline]
    pub fn get(&self, index: u64) -> bool {
        self.assert_in_range(index);
        let (word, mask) = bit_word_mask(index);
        (self.words.cell(word).load(Ordering::Acquire) & mask) != 0
    }

    /// Sets `index`.
    ///
    /// # Panics
    /// Panics if `index >= len()`.
    #[inline]
    pub fn set(&self, index: u64) {
        self.get_and_set(index);
    }

    /// Sets `index` and returns its previous state.
    ///
    /// # Panics
    /// Panics if `index >= len()`.
    #[inline]
    pub fn get_and_set(&self, index: u64) -> bool {
        self.assert_in_range(index);
        let (word, mask) = bit_word_mask(index);
        let prev = self.words.cell(word).fetch_or(mask, Ordering::AcqRel);
        (prev & mask) != 0
    }

    /// Clears `index`.
    ///
    /// # Panics
    /// Panics if `index >= len()`.
    #[inline]
    pub fn clear(&self, index: u64) {
        self.assert_in_range(index);
        let (word, mask) = bit_word_mask(index);
        self.words.cell(word).fetch_and(!mask, Ordering::AcqRel);
    }

    /// Sets every bit in `start..end`.
    ///
    /// # Panics
    /// Panics if `start > end` or `end > len()`.
    pub fn set_range(&self, start: u64, end: u64) {
        assert!(start <= end && end <= self.num_bits, "invalid bit range {start}..{end}");
        if start == end {
            return;
        }
        let first_word = start >> 6;
        let last_word = (end - 1) >> 6;
        let start_mask = u64::MAX << (start & 63);
        let end_mask = u64::MAX >> (63 - ((end - 1) & 63));
        if first_word == last_word {
            self.words
                .cell(first_word)
                .fetch_or(start_mask & end_mask, Ordering::AcqRel);
            return;
        }
        self.words.cell(first_word).fetch_or(start_mask, Ordering::AcqRel);
        for word in first_word + 1..last_word {
            self.words.cell(word).store(u64::MAX, Ordering::Release);
        }
        self.words.cell(last_word).fetch_or(end_mask, Ordering::AcqRel);
    }

    /// Returns `true` if every bit is set (vacuously true for an empty set).
    pub fn all_set(&self) -> bool {
        let words = self.words.len();
        if words == 0 {
            return true;
        }
        let tail_bits = self.num_bits & 63;
        let last_mask = if tail_bits == 0 { u64::MAX } else { (1u64 << tail_bits) - 1 };
        self.words.cells().enumerate().all(|(i, w)| {
            let expected = if i as u64 == words - 1 { last_mask } else { u64::MAX };
            w.load(Ordering::Acquire) & expected == expected
        })
    }

    /// Number of set bits.
    pub fn cardinality(&self) -> u64 {
        self.words
            .cells()
            .map(|w| u64::from(w.load(Ordering::Acquire).count_ones()))
            .sum()
    }

    /// Clears all bits.
    pub fn clear_all(&self) {
        for w in self.words.cells() {
            w.store(0, Ordering::Relaxed);
        }
    }

    #[inline(always)]
    fn assert_in_range(&self, index: u64) {
        assert!(
            index < self.num_bits,
            "bit {index} out of range for length {}",
            self.num_bits
        );
    }
}

#[inline(always)]
fn num_words(num_bits: u64) -> u64 {
    num_bits.div_ceil(64)
}

#[inline(always)]
fn bit_word_mask(bit: u64) -> (u64, u64) {
    (bit >> 6, 1u64 << (bit & 63))
}
