//! Huge arrays: `u64`-indexed storage split into power-of-two pages.
//!
//! ## Addressing
//!
//! With a page of `2^p` elements an index `i` lives at
//! `(i >> p, i & (2^p - 1))`. No division on the hot path, each physical page
//! stays small, and the final page is allocated only up to its used length.
//!
//! ```text
//! index:   0 .. 2^p-1 | 2^p .. 2·2^p-1 | ... | (k-1)·2^p .. size-1
//! pages:  [  page 0  ] [    page 1    ] ... [ last page (partial) ]
//! ```
//!
//! ## Storage variants
//!
//! | Size | Variant | Cursor |
//! |------|---------|--------|
//! | `size <= page_size` | single page | one step, no page switching |
//! | `size > page_size` | paged | walks page by page |
//!
//! The page size is derived from a fixed byte budget per page
//! ([`PAGE_SIZE_IN_BYTES`]) and `size_of::<T>()`, see [`PageLayout::of`].

mod array;
mod cursor;
mod memory;


pub use array::HugeArray;
pub use cursor::HugeCursor;
pub use memory::{MemoryBudget, MAX_ALLOCATION_BYTES};

pub(crate) use memory::{checked_page_len, try_alloc_page};

/// Target byte size of one physical page.
pub const PAGE_SIZE_IN_BYTES: usize = 1 << 15;

/// Page geometry shared by every huge structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLayout {
    shift: u32,
    mask: u64,
}

impl PageLayout {
    /// Layout whose pages hold `2^shift` elements.
    ///
    /// # Panics
    /// Panics if `shift >= 48`.
    pub const fn with_shift(shift: u32) -> Self {
        assert!(shift < 48, "page shift too large");
        Self {
            shift,
            mask: (1u64 << shift) - 1,
        }
    }

    /// Layout for elements of type `T` under [`PAGE_SIZE_IN_BYTES`].
    pub const fn of<T>() -> Self {
        Self::for_element_size(core::mem::size_of::<T>())
    }

    /// Layout for elements of `element_size` bytes under [`PAGE_SIZE_IN_BYTES`].
    ///
    /// Zero-sized and oversized elements still get at least one element per page.
    pub const fn for_element_size(element_size: usize) -> Self {
        let elements = if element_size == 0 {
            PAGE_SIZE_IN_BYTES
        } else if element_size >= PAGE_SIZE_IN_BYTES {
            1
        } else {
            PAGE_SIZE_IN_BYTES / element_size
        };
        // floor(log2(elements)); `elements >= 1`.
        Self::with_shift(usize::BITS - 1 - elements.leading_zeros())
    }

    /// `log2` of the page size.
    #[inline(always)]
    pub const fn shift(&self) -> u32 {
        self.shift
    }

    /// Elements per page.
    #[inline(always)]
    pub const fn page_size(&self) -> u64 {
        1u64 << self.shift
    }

    /// Page holding `index`.
    #[inline(always)]
    pub const fn page_index(&self, index: u64) -> u64 {
        index >> self.shift
    }

    /// Offset of `index` inside its page.
    #[inline(always)]
    pub const fn index_in_page(&self, index: u64) -> u64 {
        index & self.mask
    }

    /// Exclusive end offset inside the last page for a structure of `size` elements.
    ///
    /// For a page-aligned `size` this is a full page, never zero.
    #[inline(always)]
    pub const fn exclusive_index_of_page(&self, size: u64) -> u64 {
        1 + self.index_in_page(size - 1)
    }

    /// Number of pages needed to hold `size` elements.
    ///
    /// Exact for every `size`, including sizes within one page of `u64::MAX`.
    #[inline(always)]
    pub const fn num_pages(&self, size: u64) -> u64 {
        (size >> self.shift) + (self.index_in_page(size) != 0) as u64
    }

    /// Length of page `page` for a structure of `size` elements.
    #[inline(always)]
    pub const fn page_len(&self, page: u64, size: u64) -> u64 {
        let last = self.num_pages(size) - 1;
        if page == last {
            self.exclusive_index_of_page(size)
        } else {
            self.page_size()
        }
    }
}
