//! `HugeArray`: a fixed-length, `u64`-indexed paged array.

use core::fmt;
use core::ops::{Index, IndexMut};

use super::{checked_page_len, try_alloc_page, HugeCursor, MemoryBudget, PageLayout};
use crate::error::{Error, Result};

/// A fixed-length array indexed by `u64`, stored as power-of-two pages.
///
/// ### Performance Characteristics
/// | Operation | Complexity | Notes |
/// |-----------|------------|-------|
/// | `get` / `set` | \(O(1)\) | shift + mask, two bounds checks |
/// | `get_unchecked` | \(O(1)\) | no bounds checks |
/// | `fill` / `set_all` | \(O(n)\) | page-wise |
/// | `cursor` | \(O(1)\) | borrows pages, no allocation |
///
/// Every valid index maps to exactly one `(page, offset)` pair; only the last
/// page may be shorter than [`PageLayout::page_size`].
pub struct HugeArray<T> {
    size: u64,
    layout: PageLayout,
    pages: Box<[Box<[T]>]>,
}

impl<T: Default> HugeArray<T> {
    /// Allocates `size` default-initialized elements without a memory limit.
    ///
    /// # Errors
    /// Returns [`Error::Allocation`] if the host refuses a page allocation.
    pub fn new(size: u64) -> Result<Self> {
        Self::with_budget(size, &MemoryBudget::unlimited())
    }

    /// Allocates `size` default-initialized elements if the estimate fits `budget`.
    ///
    /// # Errors
    /// Returns [`Error::Allocation`] if [`Self::memory_estimation`] exceeds the
    /// budget or the host refuses a page allocation.
    pub fn with_budget(size: u64, budget: &MemoryBudget) -> Result<Self> {
        Self::from_fn_with_layout(size, PageLayout::of::<T>(), budget, |_| T::default())
    }
}

impl<T> HugeArray<T> {
    /// Allocates `size` elements, element `i` produced by `f(i)`.
    ///
    /// # Errors
    /// Returns [`Error::Allocation`] if the host refuses a page allocation.
    pub fn from_fn(size: u64, f: impl FnMut(u64) -> T) -> Result<Self> {
        Self::from_fn_with_layout(size, PageLayout::of::<T>(), &MemoryBudget::unlimited(), f)
    }

    /// Allocates with an explicit page layout.
    ///
    /// Small layouts are mainly useful to exercise multi-page behavior on small inputs.
    ///
    /// # Errors
    /// Returns [`Error::Allocation`] on budget overflow or host allocation failure.
    pub fn from_fn_with_layout(
        size: u64,
        layout: PageLayout,
        budget: &MemoryBudget,
        mut f: impl FnMut(u64) -> T,
    ) -> Result<Self> {
        budget.check(Self::memory_estimation_with(size, layout))?;

        let num_pages = checked_page_len(layout.num_pages(size), core::mem::size_of::<Box<[T]>>())?;
        let mut pages: Vec<Box<[T]>> = Vec::new();
        pages.try_reserve_exact(num_pages).map_err(|_| Error::Allocation {
            requested_bytes: Self::memory_estimation_with(size, layout),
            budget_bytes: 0,
        })?;

        for page in 0..num_pages as u64 {
            let base = page << layout.shift();
            let len = checked_page_len(layout.page_len(page, size), core::mem::size_of::<T>())?;
            pages.push(try_alloc_page(len, |i| f(base + i as u64))?);
        }

        Ok(Self {
            size,
            layout,
            pages: pages.into_boxed_slice(),
        })
    }

    /// Estimated bytes for an array of `size` elements with the default layout.
    pub fn memory_estimation(size: u64) -> u64 {
        Self::memory_estimation_with(size, PageLayout::of::<T>())
    }

    fn memory_estimation_with(size: u64, layout: PageLayout) -> u64 {
        let header = core::mem::size_of::<Self>() as u64;
        let page_table = layout
            .num_pages(size)
            .saturating_mul(core::mem::size_of::<Box<[T]>>() as u64);
        let data = size.saturating_mul(core::mem::size_of::<T>() as u64);
        header.saturating_add(page_table).saturating_add(data)
    }

    /// Number of elements.
    #[inline(always)]
    pub fn len(&self) -> u64 {
        self.size
    }

    /// Returns `true` if the array holds no elements.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Page geometry of this array.
    #[inline(always)]
    pub fn layout(&self) -> PageLayout {
        self.layout
    }

    /// Number of physical pages.
    #[inline(always)]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    #[inline(always)]
    pub(crate) fn pages(&self) -> &[Box<[T]>] {
        &self.pages
    }

    /// Returns a reference to element `index`.
    ///
    /// # Panics
    /// Panics if `index >= len()`.
    #[inline]
    pub fn get(&self, index: u64) -> &T {
        self.assert_in_range(index);
        // SAFETY: index checked above.
        unsafe { self.get_unchecked(index) }
    }

    /// Returns a mutable reference to element `index`.
    ///
    /// # Panics
    /// Panics if `index >= len()`.
    #[inline]
    pub fn get_mut(&mut self, index: u64) -> &mut T {
        self.assert_in_range(index);
        // SAFETY: index checked above.
        unsafe { self.get_unchecked_mut(index) }
    }

    /// Overwrites element `index`.
    ///
    /// # Panics
    /// Panics if `index >= len()`.
    #[inline]
    pub fn set(&mut self, index: u64, value: T) {
        *self.get_mut(index) = value;
    }

    /// Checked variant of [`Self::get`].
    ///
    /// # Errors
    /// Returns [`Error::IndexOutOfRange`] if `index >= len()`.
    pub fn try_get(&self, index: u64) -> Result<&T> {
        self.check_index(index)?;
        // SAFETY: index checked above.
        Ok(unsafe { self.get_unchecked(index) })
    }

    /// Checked variant of [`Self::set`].
    ///
    /// # Errors
    /// Returns [`Error::IndexOutOfRange`] if `index >= len()`.
    pub fn try_set(&mut self, index: u64, value: T) -> Result<()> {
        self.check_index(index)?;
        // SAFETY: index checked above.
        unsafe { *self.get_unchecked_mut(index) = value };
        Ok(())
    }

    /// # Safety
    /// Caller must ensure `index < len()`.
    #[inline(always)]
    pub unsafe fn get_unchecked(&self, index: u64) -> &T {
        let page = self.layout.page_index(index) as usize;
        let offset = self.layout.index_in_page(index) as usize;
        // SAFETY: caller guarantees `index < size`, so both indices are in bounds.
        unsafe { self.pages.get_unchecked(page).get_unchecked(offset) }
    }

    /// # Safety
    /// Caller must ensure `index < len()`.
    #[inline(always)]
    pub unsafe fn get_unchecked_mut(&mut self, index: u64) -> &mut T {
        let page = self.layout.page_index(index) as usize;
        let offset = self.layout.index_in_page(index) as usize;
        // SAFETY: caller guarantees `index < size`, so both indices are in bounds.
        unsafe { self.pages.get_unchecked_mut(page).get_unchecked_mut(offset) }
    }

    /// Sets every element to `f(index)`.
    pub fn set_all(&mut self, mut f: impl FnMut(u64) -> T) {
        let shift = self.layout.shift();
        for (page_idx, page) in self.pages.iter_mut().enumerate() {
            let base = (page_idx as u64) << shift;
            for (i, slot) in page.iter_mut().enumerate() {
                *slot = f(base + i as u64);
            }
        }
    }

    /// Iterates all elements in index order.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.pages.iter().flat_map(|page| page.iter())
    }

    /// Iterates all elements mutably in index order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        self.pages.iter_mut().flat_map(|page| page.iter_mut())
    }

    /// Consumes the array, mapping every element while keeping the page layout.
    pub fn map_into<U>(self, mut f: impl FnMut(T) -> U) -> HugeArray<U> {
        let pages: Vec<Box<[U]>> = self
            .pages
            .into_vec()
            .into_iter()
            .map(|page| page.into_vec().into_iter().map(&mut f).collect())
            .collect();
        HugeArray {
            size: self.size,
            layout: self.layout,
            pages: pages.into_boxed_slice(),
        }
    }

    /// A cursor over the whole array.
    pub fn cursor(&self) -> HugeCursor<'_, T> {
        HugeCursor::new(self, 0, self.size)
    }

    /// A cursor over `start..end`.
    ///
    /// # Panics
    /// Panics if `start > end` or `end > len()`.
    pub fn cursor_range(&self, start: u64, end: u64) -> HugeCursor<'_, T> {
        HugeCursor::new(self, start, end)
    }

    #[inline(always)]
    fn assert_in_range(&self, index: u64) {
        assert!(
            index < self.size,
            "index {index} out of range for length {}",
            self.size
        );
    }

    #[inline(always)]
    fn check_index(&self, index: u64) -> Result<()> {
        if index < self.size {
            Ok(())
        } else {
            Err(Error::IndexOutOfRange {
                index,
                len: self.size,
            })
        }
    }
}

impl<T: Clone> HugeArray<T> {
    /// Resets every element to `value`.
    pub fn fill(&mut self, value: T) {
        for page in self.pages.iter_mut() {
            page.fill(value.clone());
        }
    }

    /// Copies the contents into a `Vec`.
    ///
    /// # Errors
    /// Returns [`Error::Allocation`] if `len()` does not fit in `usize` or the
    /// host refuses the allocation.
    pub fn try_to_vec(&self) -> Result<Vec<T>> {
        let len = checked_page_len(self.size, core::mem::size_of::<T>())?;
        let mut out = Vec::new();
        out.try_reserve_exact(len).map_err(|_| Error::Allocation {
            requested_bytes: self.size.saturating_mul(core::mem::size_of::<T>() as u64),
            budget_bytes: 0,
        })?;
        for page in self.pages.iter() {
            out.extend_from_slice(page);
        }
        Ok(out)
    }

    /// Copies the contents into a `Vec`.
    ///
    /// # Panics
    /// Panics if `len()` does not fit in `usize`; see [`Self::try_to_vec`].
    pub fn to_vec(&self) -> Vec<T> {
        let Ok(len) = usize::try_from(self.size) else {
            panic!(
                "huge array of length {} does not fit in a Vec on this target (usize::MAX = {})",
                self.size,
                usize::MAX
            );
        };
        let mut out = Vec::with_capacity(len);
        for page in self.pages.iter() {
            out.extend_from_slice(page);
        }
        out
    }
}

impl<T: Clone> Clone for HugeArray<T> {
    fn clone(&self) -> Self {
        Self {
            size: self.size,
            layout: self.layout,
            pages: self.pages.clone(),
        }
    }
}

impl<T> Index<u64> for HugeArray<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: u64) -> &T {
        self.get(index)
    }
}

impl<T> IndexMut<u64> for HugeArray<T> {
    #[inline]
    fn index_mut(&mut self, index: u64) -> &mut T {
        self.get_mut(index)
    }
}

impl<T: fmt::Debug> fmt::Debug for HugeArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HugeArray")
            .field("size", &self.size)
            .field("page_size", &self.layout.page_size())
            .field("pages", &self.pages.len())
            .finish()
    }
}
