//! Messenger that combines all `f64` messages for a node into one.
//!
//! Instead of queueing, `send_to` folds the message into the target's cell
//! with the CAS-retry loop of [`HugeAtomicDoubleArray::update`]. A bit set
//! records which nodes received anything so that an inbox whose reduced
//! value equals the identity is still distinguishable from an empty one.

use core::sync::atomic::{AtomicBool, Ordering};

use crossbeam_utils::CachePadded;

use super::{Messages, Messenger};
use crate::collections::huge::MemoryBudget;
use crate::concurrency::atomic::{HugeAtomicBitSet, HugeAtomicDoubleArray};
use crate::error::Result;

/// An associative, commutative combination of `f64` messages.
pub trait Reducer: Send + Sync {
    /// The neutral element: `reduce(identity(), m) == m`.
    fn identity(&self) -> f64;

    /// Combines the value accumulated so far with one more message.
    fn reduce(&self, current: f64, message: f64) -> f64;
}

/// Adds messages up.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sum;

/// Keeps the smallest message.
#[derive(Debug, Default, Clone, Copy)]
pub struct Min;

/// Keeps the largest message.
#[derive(Debug, Default, Clone, Copy)]
pub struct Max;

/// Counts messages, ignoring their values.
#[derive(Debug, Default, Clone, Copy)]
pub struct Count;

impl Reducer for Sum {
    fn identity(&self) -> f64 {
        0.0
    }
    fn reduce(&self, current: f64, message: f64) -> f64 {
        current + message
    }
}

impl Reducer for Min {
    fn identity(&self) -> f64 {
        f64::INFINITY
    }
    fn reduce(&self, current: f64, message: f64) -> f64 {
        current.min(message)
    }
}

impl Reducer for Max {
    fn identity(&self) -> f64 {
        f64::NEG_INFINITY
    }
    fn reduce(&self, current: f64, message: f64) -> f64 {
        current.max(message)
    }
}

impl Reducer for Count {
    fn identity(&self) -> f64 {
        0.0
    }
    fn reduce(&self, current: f64, _message: f64) -> f64 {
        current + 1.0
    }
}

struct ReducedBuffer {
    values: HugeAtomicDoubleArray,
    received: HugeAtomicBitSet,
    sent: CachePadded<AtomicBool>,
}

impl ReducedBuffer {
    fn new(node_count: u64, budget: &MemoryBudget, identity: f64) -> Result<Self> {
        Ok(Self {
            values: HugeAtomicDoubleArray::with_budget(node_count, budget, identity)?,
            received: HugeAtomicBitSet::with_budget(node_count, budget)?,
            sent: CachePadded::new(AtomicBool::new(false)),
        })
    }

    fn clear(&mut self, identity: f64) {
        if !*self.sent.get_mut() {
            return;
        }
        self.values.fill(identity);
        self.received.clear_all();
        *self.sent.get_mut() = false;
    }
}

/// Messenger holding at most one reduced `f64` per node and superstep.
pub struct ReducingMessenger<R> {
    reducer: R,
    read: ReducedBuffer,
    write: ReducedBuffer,
}

impl<R: Reducer> ReducingMessenger<R> {
    /// Creates empty buffers for `node_count` nodes.
    ///
    /// # Errors
    /// Returns [`crate::Error::Allocation`] if the buffers cannot be allocated.
    pub fn new(node_count: u64, reducer: R) -> Result<Self> {
        Self::with_budget(node_count, reducer, &MemoryBudget::unlimited())
    }

    /// Creates empty buffers, checking each array against `budget`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Allocation`] if an array exceeds the budget.
    pub fn with_budget(node_count: u64, reducer: R, budget: &MemoryBudget) -> Result<Self> {
        let identity = reducer.identity();
        Ok(Self {
            read: ReducedBuffer::new(node_count, budget, identity)?,
            write: ReducedBuffer::new(node_count, budget, identity)?,
            reducer,
        })
    }

    /// The reducer combining messages.
    pub fn reducer(&self) -> &R {
        &self.reducer
    }
}

impl<R: Reducer> Messenger<f64> for ReducingMessenger<R> {
    fn send_to(&self, target: u64, message: f64) {
        let buffer = &self.write;
        buffer
            .values
            .update(target, |current| self.reducer.reduce(current, message));
        buffer.received.set(target);
        if !buffer.sent.load(Ordering::Relaxed) {
            buffer.sent.store(true, Ordering::Relaxed);
        }
    }

    fn messages(&self, node: u64) -> Messages<'_, f64> {
        if self.read.received.get(node) {
            Messages::single(self.read.values.get(node))
        } else {
            Messages::empty()
        }
    }

    fn sent_any(&self) -> bool {
        self.write.sent.load(Ordering::Relaxed)
    }

    fn swap(&mut self) {
        core::mem::swap(&mut self.read, &mut self.write);
        self.write.clear(self.reducer.identity());
    }

    fn memory_estimation(node_count: u64, _relationship_count: u64) -> u64 {
        let buffer = HugeAtomicDoubleArray::memory_estimation(node_count)
            .saturating_add(HugeAtomicBitSet::memory_estimation(node_count));
        (core::mem::size_of::<Self>() as u64).saturating_add(buffer.saturating_mul(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inbox<R: Reducer>(m: &ReducingMessenger<R>, node: u64) -> Vec<f64> {
        m.messages(node).collect()
    }

    #[test]
    fn reducers_fold_from_identity() {
        let messages = [3.0, -1.0, 7.5];
        let fold = |r: &dyn Reducer| messages.iter().fold(r.identity(), |acc, &m| r.reduce(acc, m));
        assert_eq!(fold(&Sum), 9.5);
        assert_eq!(fold(&Min), -1.0);
        assert_eq!(fold(&Max), 7.5);
        assert_eq!(fold(&Count), 3.0);
    }

    #[test]
    fn one_message_per_node() {
        let mut m = ReducingMessenger::new(3, Sum).unwrap();
        m.send_to(1, 2.0);
        m.send_to(1, 3.0);
        assert!(m.sent_any());
        assert!(m.messages(1).is_empty());
        m.swap();
        assert!(!m.sent_any());
        assert_eq!(inbox(&m, 1), vec![5.0]);
        assert!(inbox(&m, 0).is_empty());
        m.swap();
        assert!(inbox(&m, 1).is_empty());
    }

    #[test]
    fn identity_valued_inbox_is_not_empty() {
        let mut m = ReducingMessenger::new(2, Sum).unwrap();
        m.send_to(0, 1.0);
        m.send_to(0, -1.0);
        m.swap();
        assert_eq!(inbox(&m, 0), vec![0.0]);
    }

    #[test]
    fn concurrent_min() {
        let mut m = ReducingMessenger::new(1, Min).unwrap();
        std::thread::scope(|s| {
            for t in 0..8 {
                let m = &m;
                s.spawn(move || {
                    for i in 0..1_000 {
                        m.send_to(0, f64::from(t * 1_000 + i + 1));
                    }
                });
            }
        });
        m.swap();
        assert_eq!(inbox(&m, 0), vec![1.0]);
    }

    #[test]
    fn concurrent_count() {
        let mut m = ReducingMessenger::new(1, Count).unwrap();
        std::thread::scope(|s| {
            for _ in 0..4 {
                let m = &m;
                s.spawn(move || (0..2_500).for_each(|_| m.send_to(0, 42.0)));
            }
        });
        m.swap();
        assert_eq!(inbox(&m, 0), vec![10_000.0]);
    }
}
