//! Reusable page cursors over a [`HugeArray`].
//!
//! A cursor hands out one page slice at a time. Inside a page the caller loops
//! over `offset()..limit()` of `array()`; the global index of a local position
//! `i` is `base() + i`.
//!
//! ```rust
//! use pregel_engine::collections::huge::HugeArray;
//!
//! let array = HugeArray::from_fn(100, |i| i * 2).unwrap();
//! let mut cursor = array.cursor_range(10, 20);
//! let mut sum = 0;
//! while cursor.next() {
//!     for i in cursor.offset()..cursor.limit() {
//!         assert_eq!(cursor.array()[i], (cursor.base() + i as u64) * 2);
//!         sum += cursor.array()[i];
//!     }
//! }
//! assert_eq!(sum, (10..20).map(|i| i * 2).sum::<u64>());
//! // exhausted until reset
//! assert!(!cursor.next());
//! cursor.reset();
//! assert!(cursor.next());
//! ```

use super::{HugeArray, PageLayout};

enum Kind<'a, T> {
    /// The whole array lives in one page: one step, no page switching.
    SinglePage { page: &'a [T], exhausted: bool },
    /// Walks pages `from_page..=max_page`.
    Paged {
        pages: &'a [Box<[T]>],
        layout: PageLayout,
        next_page: usize,
        from_page: usize,
        max_page: usize,
        from_offset: usize,
        to_offset: usize,
        empty: bool,
    },
}

/// A borrowed, resettable view over a range of a [`HugeArray`].
pub struct HugeCursor<'a, T> {
    kind: Kind<'a, T>,
    size: u64,
    start: u64,
    end: u64,
    base: u64,
    array: &'a [T],
    offset: usize,
    limit: usize,
}

impl<'a, T> HugeCursor<'a, T> {
    pub(super) fn new(huge: &'a HugeArray<T>, start: u64, end: u64) -> Self {
        let pages = huge.pages();
        let kind = if pages.len() <= 1 {
            Kind::SinglePage {
                page: pages.first().map_or(&[][..], |p| &p[..]),
                exhausted: true,
            }
        } else {
            Kind::Paged {
                pages,
                layout: huge.layout(),
                next_page: 0,
                from_page: 0,
                max_page: 0,
                from_offset: 0,
                to_offset: 0,
                empty: true,
            }
        };
        let mut cursor = Self {
            kind,
            size: huge.len(),
            start,
            end,
            base: 0,
            array: &[],
            offset: 0,
            limit: 0,
        };
        cursor.set_range(start, end);
        cursor
    }

    /// Rebinds the cursor to `start..end` of the same array.
    ///
    /// # Panics
    /// Panics if `start > end` or `end > len`.
    pub fn set_range(&mut self, start: u64, end: u64) {
        assert!(start <= end, "cursor start {start} is after end {end}");
        assert!(
            end <= self.size,
            "cursor end {end} out of range for length {}",
            self.size
        );
        self.start = start;
        self.end = end;
        self.base = 0;
        self.array = &[];
        self.offset = 0;
        self.limit = 0;

        match &mut self.kind {
            Kind::SinglePage { exhausted, .. } => *exhausted = start == end,
            Kind::Paged {
                layout,
                next_page,
                from_page,
                max_page,
                from_offset,
                to_offset,
                empty,
                ..
            } => {
                *empty = start == end;
                if !*empty {
                    *from_page = layout.page_index(start) as usize;
                    *max_page = layout.page_index(end - 1) as usize;
                    *from_offset = layout.index_in_page(start) as usize;
                    *to_offset = layout.exclusive_index_of_page(end) as usize;
                    *next_page = *from_page;
                }
            }
        }
    }

    /// Rewinds to the start of the current range.
    pub fn reset(&mut self) {
        self.set_range(self.start, self.end);
    }

    /// Advances to the next page; returns `false` once the range is exhausted.
    ///
    /// Keeps returning `false` until [`Self::reset`] or [`Self::set_range`].
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> bool {
        match &mut self.kind {
            Kind::SinglePage { page, exhausted } => {
                if *exhausted {
                    return false;
                }
                *exhausted = true;
                self.base = 0;
                self.array = *page;
                self.offset = self.start as usize;
                self.limit = self.end as usize;
                true
            }
            Kind::Paged {
                pages,
                layout,
                next_page,
                from_page,
                max_page,
                from_offset,
                to_offset,
                empty,
            } => {
                if *empty || *next_page > *max_page {
                    return false;
                }
                let current = *next_page;
                *next_page += 1;
                let pages: &'a [Box<[T]>] = *pages;
                let page: &'a [T] = &pages[current];
                self.base = (current as u64) << layout.shift();
                self.array = page;
                self.offset = if current == *from_page { *from_offset } else { 0 };
                self.limit = if current == *max_page { *to_offset } else { page.len() };
                true
            }
        }
    }

    /// Global index of `array()[0]`.
    #[inline(always)]
    pub fn base(&self) -> u64 {
        self.base
    }

    /// The current page.
    #[inline(always)]
    pub fn array(&self) -> &'a [T] {
        self.array
    }

    /// First valid local index in the current page.
    #[inline(always)]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Exclusive end of valid local indices in the current page.
    #[inline(always)]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// The valid part of the current page.
    #[inline(always)]
    pub fn slice(&self) -> &'a [T] {
        &self.array[self.offset..self.limit]
    }

    /// Global index of the first element of [`Self::slice`].
    #[inline(always)]
    pub fn slice_start(&self) -> u64 {
        self.base + self.offset as u64
    }
}
