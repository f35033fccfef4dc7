//! Per-node computation values shared by all workers of a superstep.

use core::cell::UnsafeCell;

use crate::collections::huge::{HugeArray, MemoryBudget};
use crate::error::Result;

#[repr(transparent)]
#[derive(Default)]
struct SyncCell<V>(UnsafeCell<V>);

// SAFETY: cells are only written through `NodeValues::get_mut`, whose callers
// guarantee that no two threads touch the same node concurrently.
unsafe impl<V: Send> Sync for SyncCell<V> {}

/// One `V` per node, writable from many threads as long as each thread
/// touches only the nodes of its own partition.
pub(crate) struct NodeValues<V> {
    cells: HugeArray<SyncCell<V>>,
}

impl<V: Default> NodeValues<V> {
    pub(crate) fn new(node_count: u64, budget: &MemoryBudget) -> Result<Self> {
        Ok(Self {
            cells: HugeArray::with_budget(node_count, budget)?,
        })
    }
}

impl<V> NodeValues<V> {
    pub(crate) fn memory_estimation(node_count: u64) -> u64 {
        HugeArray::<SyncCell<V>>::memory_estimation(node_count)
    }

    pub(crate) fn len(&self) -> u64 {
        self.cells.len()
    }

    /// # Safety
    /// No other thread may hold a mutable reference to `node`'s value.
    #[inline]
    pub(crate) unsafe fn get(&self, node: u64) -> &V {
        // SAFETY: upheld by the caller.
        unsafe { &*self.cells.get(node).0.get() }
    }

    /// # Safety
    /// The caller must be the only one accessing `node`'s value for the
    /// lifetime of the returned reference.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn get_mut(&self, node: u64) -> &mut V {
        // SAFETY: upheld by the caller.
        unsafe { &mut *self.cells.get(node).0.get() }
    }

    /// Safe access while no superstep is running.
    #[inline]
    pub(crate) fn get_exclusive(&mut self, node: u64) -> &mut V {
        self.cells.get_mut(node).0.get_mut()
    }

    pub(crate) fn into_values(self) -> HugeArray<V> {
        self.cells.map_into(|cell| cell.0.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disjoint_writers() {
        let values: NodeValues<u64> = NodeValues::new(1_000, &MemoryBudget::unlimited()).unwrap();
        std::thread::scope(|s| {
            for chunk in 0..4u64 {
                let values = &values;
                s.spawn(move || {
                    for node in chunk * 250..(chunk + 1) * 250 {
                        // SAFETY: each thread owns a disjoint node range.
                        unsafe { *values.get_mut(node) = node * 2 };
                    }
                });
            }
        });
        let out = values.into_values();
        assert_eq!(out.len(), 1_000);
        assert!(out.iter().enumerate().all(|(i, &v)| v == i as u64 * 2));
    }

    #[test]
    fn exclusive_access() {
        let mut values: NodeValues<String> = NodeValues::new(3, &MemoryBudget::unlimited()).unwrap();
        values.get_exclusive(1).push_str("x");
        // SAFETY: single-threaded.
        assert_eq!(unsafe { values.get(1) }, "x");
        assert_eq!(values.len(), 3);
    }
}
