//! Paged storage of atomic cells shared by the huge atomic arrays.

use crate::collections::huge::{checked_page_len, try_alloc_page, MemoryBudget, PageLayout};
use crate::error::{Error, Result};

/// `u64`-indexed pages of atomic cells of type `A`.
///
/// Cells are only ever handed out by shared reference; all mutation goes
/// through the cell's own atomic operations.
pub(crate) struct AtomicPages<A> {
    size: u64,
    layout: PageLayout,
    pages: Box<[Box<[A]>]>,
}

impl<A> AtomicPages<A> {
    pub(crate) fn new(size: u64, budget: &MemoryBudget, mut init: impl FnMut() -> A) -> Result<Self> {
        let layout = PageLayout::of::<A>();
        budget.check(Self::memory_estimation(size))?;

        let num_pages = checked_page_len(layout.num_pages(size), core::mem::size_of::<Box<[A]>>())?;
        let mut pages = Vec::new();
        pages.try_reserve_exact(num_pages).map_err(|_| Error::Allocation {
            requested_bytes: Self::memory_estimation(size),
            budget_bytes: 0,
        })?;
        for page in 0..num_pages as u64 {
            let len = checked_page_len(layout.page_len(page, size), core::mem::size_of::<A>())?;
            pages.push(try_alloc_page(len, |_| init())?);
        }
        Ok(Self {
            size,
            layout,
            pages: pages.into_boxed_slice(),
        })
    }

    pub(crate) fn memory_estimation(size: u64) -> u64 {
        let layout = PageLayout::of::<A>();
        (core::mem::size_of::<Self>() as u64)
            .saturating_add(
                layout
                    .num_pages(size)
                    .saturating_mul(core::mem::size_of::<Box<[A]>>() as u64),
            )
            .saturating_add(size.saturating_mul(core::mem::size_of::<A>() as u64))
    }

    #[inline(always)]
    pub(crate) fn len(&self) -> u64 {
        self.size
    }

    /// Returns the cell at `index`.
    ///
    /// # Panics
    /// Panics if `index >= len()`.
    #[inline(always)]
    pub(crate) fn cell(&self, index: u64) -> &A {
        assert!(
            index < self.size,
            "index {index} out of range for length {}",
            self.size
        );
        // SAFETY: index checked above.
        unsafe { self.cell_unchecked(index) }
    }

    /// # Safety
    /// Caller must ensure `index < len()`.
    #[inline(always)]
    pub(crate) unsafe fn cell_unchecked(&self, index: u64) -> &A {
        let page = self.layout.page_index(index) as usize;
        let offset = self.layout.index_in_page(index) as usize;
        // SAFETY: caller guarantees bounds.
        unsafe { self.pages.get_unchecked(page).get_unchecked(offset) }
    }

    pub(crate) fn cells(&self) -> impl Iterator<Item = &A> + '_ {
        self.pages.iter().flat_map(|page| page.iter())
    }
}
