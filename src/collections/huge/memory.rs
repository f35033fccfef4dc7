//! Memory budgeting for huge allocations.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Largest byte count any single structure may request, budget or not.
///
/// Matches the `isize::MAX` ceiling of Rust allocations.
pub const MAX_ALLOCATION_BYTES: u64 = isize::MAX as u64;

/// Upper bound on bytes a huge structure (or a whole run) may request.
///
/// Every limit, including [`MemoryBudget::unlimited`], is capped at
/// [`MAX_ALLOCATION_BYTES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MemoryBudget {
    limit: Option<u64>,
}

impl MemoryBudget {
    /// No limit beyond what the host can satisfy.
    pub const fn unlimited() -> Self {
        Self { limit: None }
    }

    /// At most `bytes` bytes.
    pub const fn bytes(bytes: u64) -> Self {
        Self { limit: Some(bytes) }
    }

    /// The configured limit, if any.
    pub const fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Fails with [`Error::Allocation`] if `requested_bytes` exceeds the budget.
    ///
    /// Estimates saturate at `u64::MAX`, so an overflowing size is always rejected.
    pub fn check(&self, requested_bytes: u64) -> Result<()> {
        let budget = self.limit.map_or(MAX_ALLOCATION_BYTES, |limit| limit.min(MAX_ALLOCATION_BYTES));
        if requested_bytes > budget {
            return Err(Error::Allocation {
                requested_bytes,
                budget_bytes: budget,
            });
        }
        Ok(())
    }

    /// What is left of this budget once `used_bytes` are spoken for.
    pub const fn remaining_after(&self, used_bytes: u64) -> Self {
        match self.limit {
            Some(limit) => Self::bytes(limit.saturating_sub(used_bytes)),
            None => Self::unlimited(),
        }
    }
}

/// Converts a page length to `usize`, reporting an allocation failure if the host
/// address space cannot represent it.
#[inline]
pub(crate) fn checked_page_len(len: u64, element_size: usize) -> Result<usize> {
    usize::try_from(len).map_err(|_| Error::Allocation {
        requested_bytes: len.saturating_mul(element_size as u64),
        budget_bytes: usize::MAX as u64,
    })
}

/// Allocates one page of `len` elements produced by `init`.
///
/// Host allocation failure surfaces as [`Error::Allocation`] instead of aborting.
pub(crate) fn try_alloc_page<T>(len: usize, init: impl FnMut(usize) -> T) -> Result<Box<[T]>> {
    let mut page = Vec::new();
    page.try_reserve_exact(len).map_err(|_| Error::Allocation {
        requested_bytes: (len as u64).saturating_mul(core::mem::size_of::<T>() as u64),
        budget_bytes: 0,
    })?;
    page.extend((0..len).map(init));
    Ok(page.into_boxed_slice())
}
