//! Unbounded per-node message queues.
//!
//! Each buffer is an append-only [`MessagePool`] plus one head per node.
//! Sending reserves a pool slot with a single `fetch_add`, writes the message,
//! then pushes the slot onto the target's list Treiber-style: the slot's `next`
//! takes the current head and a CAS publishes the slot as the new head.
//! Heads store `slot + 1` so that `0` means "no messages".
//!
//! The pool grows in buckets of `1024 << b` slots. The first sender to need a
//! bucket claims it and allocates it; concurrent senders wait for the claim to
//! resolve. Buckets are kept across supersteps, so a steady workload stops
//! allocating after the first few supersteps.
//!
//! A bucket that would push the pool past its byte limit, or that the host
//! refuses, is not allocated. Sends landing in it are dropped and the failure
//! is reported by [`Messenger::check_delivery`] at the next barrier.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::ptr::{self, NonNull};
use core::sync::atomic::{AtomicPtr, AtomicU64, Ordering};
use std::sync::OnceLock;

use crossbeam_utils::Backoff;

use super::{Messages, Messenger};
use crate::collections::huge::{try_alloc_page, MemoryBudget};
use crate::concurrency::atomic::HugeAtomicLongArray;
use crate::error::{Error, Result};

const FIRST_BUCKET_SHIFT: u32 = 10;
const BUCKET_COUNT: usize = (u64::BITS - FIRST_BUCKET_SHIFT) as usize;

/// `next` of a slot that holds no message.
const VACANT: u64 = u64::MAX;

struct Slot<M> {
    value: UnsafeCell<MaybeUninit<M>>,
    next: AtomicU64,
}

impl<M> Slot<M> {
    fn vacant() -> Self {
        Self {
            value: UnsafeCell::new(MaybeUninit::uninit()),
            next: AtomicU64::new(VACANT),
        }
    }
}

/// Maps a slot index to `(bucket, offset)`.
#[inline]
fn locate(index: u64) -> (usize, usize) {
    let biased = index + (1 << FIRST_BUCKET_SHIFT);
    let top = u64::BITS - 1 - biased.leading_zeros();
    let bucket = (top - FIRST_BUCKET_SHIFT) as usize;
    let offset = (biased - (1u64 << top)) as usize;
    (bucket, offset)
}

#[inline]
fn bucket_len(bucket: usize) -> usize {
    1usize << (bucket as u32 + FIRST_BUCKET_SHIFT)
}

/// Bytes of buckets `0..=bucket` together.
fn pool_bytes_through<M>(bucket: usize) -> u64 {
    let slots = (1u128 << (bucket as u32 + FIRST_BUCKET_SHIFT + 1)) - (1u128 << FIRST_BUCKET_SHIFT);
    u64::try_from(slots * core::mem::size_of::<Slot<M>>() as u128).unwrap_or(u64::MAX)
}

/// Bytes of the buckets needed to hold `slots` messages.
fn pool_bytes_for<M>(slots: u64) -> u64 {
    match slots {
        0 => 0,
        s if s > u64::MAX - (1 << FIRST_BUCKET_SHIFT) => u64::MAX,
        s => pool_bytes_through::<M>(locate(s - 1).0),
    }
}

/// Marks a bucket whose allocation is in progress.
#[inline]
fn claimed<M>() -> *mut Slot<M> {
    NonNull::dangling().as_ptr()
}

fn alloc_bucket<M>(len: usize) -> Result<*mut Slot<M>> {
    let slots = try_alloc_page(len, |_| Slot::<M>::vacant())?;
    Ok(Box::into_raw(slots).cast::<Slot<M>>())
}

/// # Safety
/// `slots` must come from [`alloc_bucket`] with the same `len` and must not be
/// used afterwards.
unsafe fn free_bucket<M>(slots: *mut Slot<M>, len: usize) {
    // SAFETY: reconstructs the boxed slice leaked by `alloc_bucket`.
    drop(unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(slots, len)) });
}

/// Lock-free append-only storage for messages of one superstep.
pub(crate) struct MessagePool<M> {
    buckets: Box<[AtomicPtr<Slot<M>>]>,
    len: AtomicU64,
    /// Byte limit for all buckets together; `None` leaves only the host limit.
    limit: Option<u64>,
    /// `(requested_bytes, budget_bytes)` of the first failed bucket since the last clear.
    failure: OnceLock<(u64, u64)>,
}

// SAFETY: the pool owns its messages. Slots are written once by the sender that
// reserved them and only read after the superstep barrier, through `&M`.
unsafe impl<M: Send> Send for MessagePool<M> {}
unsafe impl<M: Send + Sync> Sync for MessagePool<M> {}

impl<M> MessagePool<M> {
    fn new(limit: Option<u64>) -> Self {
        Self {
            buckets: (0..BUCKET_COUNT)
                .map(|_| AtomicPtr::new(ptr::null_mut()))
                .collect(),
            len: AtomicU64::new(0),
            limit,
            failure: OnceLock::new(),
        }
    }

    /// Number of sends since the last clear, including dropped ones.
    #[inline]
    fn len(&self) -> u64 {
        self.len.load(Ordering::Acquire)
    }

    /// Returns the bucket, allocating it on first use, or `None` if it cannot exist.
    fn bucket(&self, bucket: usize) -> Option<*mut Slot<M>> {
        let backoff = Backoff::new();
        loop {
            let current = self.buckets[bucket].load(Ordering::Acquire);
            if current == claimed() {
                backoff.snooze();
                continue;
            }
            if !current.is_null() {
                return Some(current);
            }
            if self.failure.get().is_some() {
                return None;
            }
            if self.buckets[bucket]
                .compare_exchange(ptr::null_mut(), claimed(), Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return self.install(bucket);
            }
        }
    }

    /// Allocates a bucket this thread claimed and publishes it (or the failure).
    fn install(&self, bucket: usize) -> Option<*mut Slot<M>> {
        let requested_bytes = pool_bytes_through::<M>(bucket);
        let allocated = match self.limit {
            Some(budget_bytes) if requested_bytes > budget_bytes => Err((requested_bytes, budget_bytes)),
            // the host refused; there is no configured budget to report
            _ => alloc_bucket::<M>(bucket_len(bucket)).map_err(|_| (requested_bytes, 0)),
        };
        match allocated {
            Ok(fresh) => {
                self.buckets[bucket].store(fresh, Ordering::Release);
                Some(fresh)
            }
            Err(failure) => {
                let _ = self.failure.set(failure);
                self.buckets[bucket].store(ptr::null_mut(), Ordering::Release);
                None
            }
        }
    }

    /// Stores `message` in a fresh slot and returns the slot index with its link.
    ///
    /// Drops `message` and returns `None` if its bucket cannot be allocated.
    fn push(&self, message: M) -> Option<(u64, &AtomicU64)> {
        let index = self.len.fetch_add(1, Ordering::AcqRel);
        let (bucket, offset) = locate(index);
        let slots = self.bucket(bucket)?;
        // SAFETY: `offset < bucket_len(bucket)` by construction of `locate`, and
        // the index was reserved by this call alone.
        let slot = unsafe { &*slots.add(offset) };
        unsafe { (*slot.value.get()).write(message) };
        Some((index, &slot.next))
    }

    /// Message at `index` and the link to the following slot (`0` = end).
    ///
    /// Only valid for indices published before the last superstep barrier.
    pub(crate) fn read(&self, index: u64) -> (&M, u64) {
        debug_assert!(index < self.len(), "slot {index} was never written");
        let (bucket, offset) = locate(index);
        let slots = self.buckets[bucket].load(Ordering::Acquire);
        // SAFETY: the slot was reserved and written before being linked from a
        // head, so its bucket exists and its value is initialized.
        unsafe {
            let slot = &*slots.add(offset);
            ((*slot.value.get()).assume_init_ref(), slot.next.load(Ordering::Acquire))
        }
    }

    /// Fails with the first allocation failure since the last clear.
    fn check(&self) -> Result<()> {
        match self.failure.get() {
            None => Ok(()),
            Some(&(requested_bytes, budget_bytes)) => Err(Error::Allocation {
                requested_bytes,
                budget_bytes,
            }),
        }
    }

    /// Drops every stored message; buckets stay allocated.
    fn clear(&mut self) {
        let len = *self.len.get_mut();
        if core::mem::needs_drop::<M>() {
            for index in 0..len {
                let (bucket, offset) = locate(index);
                let slots = *self.buckets[bucket].get_mut();
                if slots.is_null() {
                    continue;
                }
                // SAFETY: the bucket exists and `&mut self` rules out writers.
                let slot = unsafe { &mut *slots.add(offset) };
                if core::mem::replace(slot.next.get_mut(), VACANT) != VACANT {
                    // SAFETY: a non-vacant link means the value was written.
                    unsafe { slot.value.get_mut().assume_init_drop() };
                }
            }
        }
        *self.len.get_mut() = 0;
        self.failure = OnceLock::new();
    }
}

impl<M> Drop for MessagePool<M> {
    fn drop(&mut self) {
        self.clear();
        for (bucket, slots) in self.buckets.iter_mut().enumerate() {
            let slots = *slots.get_mut();
            if !slots.is_null() {
                // SAFETY: published buckets come from `alloc_bucket(bucket_len(bucket))`.
                unsafe { free_bucket(slots, bucket_len(bucket)) };
            }
        }
    }
}

struct MessageBuffer<M> {
    pool: MessagePool<M>,
    heads: HugeAtomicLongArray,
}

impl<M> MessageBuffer<M> {
    fn new(node_count: u64, budget: &MemoryBudget, pool_limit: Option<u64>) -> Result<Self> {
        Ok(Self {
            pool: MessagePool::new(pool_limit),
            heads: HugeAtomicLongArray::with_budget(node_count, budget)?,
        })
    }

    fn clear(&mut self) {
        if self.pool.len() == 0 {
            return;
        }
        self.pool.clear();
        self.heads.fill(0);
    }
}

/// Messenger delivering every message, in unspecified order.
///
/// # Examples
/// ```
/// use pregel_engine::pregel::messenger::{Messenger, QueueMessenger};
///
/// let mut messenger = QueueMessenger::new(3).unwrap();
/// messenger.send_to(1, "hello");
/// assert!(messenger.messages(1).is_empty());
/// messenger.swap();
/// assert_eq!(messenger.messages(1).collect::<Vec<_>>(), vec!["hello"]);
/// ```
pub struct QueueMessenger<M> {
    read: MessageBuffer<M>,
    write: MessageBuffer<M>,
}

impl<M> QueueMessenger<M> {
    /// Creates empty buffers for `node_count` nodes.
    ///
    /// # Errors
    /// Returns [`crate::Error::Allocation`] if the head arrays cannot be allocated.
    pub fn new(node_count: u64) -> Result<Self> {
        Self::with_budget(node_count, &MemoryBudget::unlimited())
    }

    /// Creates empty buffers within `budget`.
    ///
    /// Both head arrays are charged up front; what remains is split evenly
    /// between the two message pools and caps their growth.
    ///
    /// # Errors
    /// Returns [`crate::Error::Allocation`] if the head arrays exceed the budget.
    pub fn with_budget(node_count: u64, budget: &MemoryBudget) -> Result<Self> {
        let fixed = Self::fixed_bytes(node_count);
        budget.check(fixed)?;
        let pool_limit = budget.limit().map(|limit| limit.saturating_sub(fixed) / 2);
        Ok(Self {
            read: MessageBuffer::new(node_count, budget, pool_limit)?,
            write: MessageBuffer::new(node_count, budget, pool_limit)?,
        })
    }

    /// Bytes that do not depend on how many messages are sent.
    fn fixed_bytes(node_count: u64) -> u64 {
        let heads = HugeAtomicLongArray::memory_estimation(node_count);
        let buckets = (BUCKET_COUNT * core::mem::size_of::<AtomicPtr<Slot<M>>>()) as u64;
        (core::mem::size_of::<Self>() as u64).saturating_add(heads.saturating_add(buckets).saturating_mul(2))
    }
}

impl<M: Clone + Send + Sync> Messenger<M> for QueueMessenger<M> {
    fn send_to(&self, target: u64, message: M) {
        let buffer = &self.write;
        let Some((index, next)) = buffer.pool.push(message) else {
            return;
        };
        let link = index as i64 + 1;
        buffer.heads.update(target, |head| {
            next.store(head as u64, Ordering::Relaxed);
            link
        });
    }

    fn messages(&self, node: u64) -> Messages<'_, M> {
        let head = self.read.heads.get(node) as u64;
        if head == 0 {
            Messages::empty()
        } else {
            Messages::queue(&self.read.pool, head)
        }
    }

    fn sent_any(&self) -> bool {
        self.write.pool.len() > 0
    }

    fn check_delivery(&self) -> Result<()> {
        self.write.pool.check()
    }

    fn swap(&mut self) {
        core::mem::swap(&mut self.read, &mut self.write);
        self.write.clear();
    }

    /// One message per relationship, rounded up to whole buckets, in each buffer.
    fn memory_estimation(node_count: u64, relationship_count: u64) -> u64 {
        Self::fixed_bytes(node_count)
            .saturating_add(pool_bytes_for::<M>(relationship_count).saturating_mul(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn sorted<M: Clone + Ord + Send + Sync>(m: &QueueMessenger<M>, node: u64) -> Vec<M> {
        let mut out: Vec<M> = m.messages(node).collect();
        out.sort();
        out
    }

    #[test]
    fn locate_walks_geometric_buckets() {
        assert_eq!(locate(0), (0, 0));
        assert_eq!(locate(1023), (0, 1023));
        assert_eq!(locate(1024), (1, 0));
        assert_eq!(locate(1024 + 2047), (1, 2047));
        assert_eq!(locate(1024 + 2048), (2, 0));
        assert_eq!(bucket_len(2), 4096);
    }

    #[test]
    fn messages_become_visible_after_swap() {
        let mut m = QueueMessenger::new(4).unwrap();
        assert!(!m.sent_any());
        m.send_to(2, 10u32);
        m.send_to(2, 20);
        m.send_to(0, 5);
        assert!(m.sent_any());
        assert!(m.messages(2).is_empty());

        m.swap();
        assert!(!m.sent_any());
        assert_eq!(sorted(&m, 2), vec![10, 20]);
        assert_eq!(sorted(&m, 0), vec![5]);
        assert!(m.messages(1).is_empty());

        // nothing new sent: the next swap leaves every inbox empty
        m.swap();
        assert!((0..4).all(|n| m.messages(n).is_empty()));
    }

    #[test]
    fn inbox_spans_several_buckets() {
        let mut m = QueueMessenger::new(2).unwrap();
        for i in 0..5_000u64 {
            m.send_to(1, i);
        }
        m.swap();
        assert_eq!(sorted(&m, 1), (0..5_000).collect::<Vec<_>>());
    }

    #[test]
    fn concurrent_senders_lose_nothing() {
        let mut m = QueueMessenger::new(16).unwrap();
        let threads = 8u64;
        let per_thread = 2_000u64;
        std::thread::scope(|s| {
            for t in 0..threads {
                let m = &m;
                s.spawn(move || {
                    for i in 0..per_thread {
                        m.send_to(i % 16, t * per_thread + i);
                    }
                });
            }
        });
        m.swap();
        let mut all: Vec<u64> = (0..16).flat_map(|n| m.messages(n).collect::<Vec<_>>()).collect();
        all.sort_unstable();
        assert_eq!(all, (0..threads * per_thread).collect::<Vec<_>>());
    }

    #[test]
    fn cleared_and_dropped_messages_are_released() {
        let payload = Arc::new(());
        let mut m = QueueMessenger::new(3).unwrap();
        for n in 0..3 {
            m.send_to(n, Arc::clone(&payload));
        }
        m.swap();
        assert_eq!(Arc::strong_count(&payload), 4);
        m.swap();
        assert_eq!(Arc::strong_count(&payload), 1);

        m.send_to(1, Arc::clone(&payload));
        drop(m);
        assert_eq!(Arc::strong_count(&payload), 1);
    }

    #[test]
    fn sends_past_the_pool_limit_are_reported_at_the_barrier() {
        // room for exactly the first bucket of each pool
        let budget = MemoryBudget::bytes(QueueMessenger::<u64>::memory_estimation(4, 1024));
        let mut m = QueueMessenger::<u64>::with_budget(4, &budget).unwrap();
        for i in 0..1024u64 {
            m.send_to(i % 4, i);
        }
        m.check_delivery().unwrap();

        m.send_to(0, 5_000);
        match m.check_delivery().unwrap_err() {
            Error::Allocation {
                requested_bytes,
                budget_bytes,
            } => assert!(requested_bytes > budget_bytes),
            other => panic!("unexpected error {other:?}"),
        }

        m.swap();
        m.check_delivery().unwrap();
        let delivered: usize = (0..4).map(|n| m.messages(n).count()).sum();
        assert_eq!(delivered, 1024);
        assert!(!sorted(&m, 0).contains(&5_000));
    }

    #[test]
    fn dropped_sends_are_neither_leaked_nor_double_freed() {
        let payload = Arc::new(());
        let budget = MemoryBudget::bytes(QueueMessenger::<Arc<()>>::memory_estimation(2, 1));
        let mut m = QueueMessenger::with_budget(2, &budget).unwrap();
        for _ in 0..1_100 {
            m.send_to(1, Arc::clone(&payload));
        }
        assert!(m.check_delivery().is_err());
        assert_eq!(Arc::strong_count(&payload), 1 + 1024);

        m.swap();
        assert_eq!(m.messages(1).count(), 1024);
        m.swap();
        assert_eq!(Arc::strong_count(&payload), 1);
    }

    #[test]
    fn pool_bytes_round_up_to_whole_buckets() {
        let slot = core::mem::size_of::<Slot<u64>>() as u64;
        assert_eq!(pool_bytes_for::<u64>(0), 0);
        assert_eq!(pool_bytes_for::<u64>(1), 1024 * slot);
        assert_eq!(pool_bytes_for::<u64>(1024), 1024 * slot);
        assert_eq!(pool_bytes_for::<u64>(1025), 3072 * slot);
        assert_eq!(pool_bytes_for::<u64>(u64::MAX), u64::MAX);
    }

    #[test]
    fn estimation_grows_with_relationships() {
        let small = QueueMessenger::<u64>::memory_estimation(100, 100);
        let large = QueueMessenger::<u64>::memory_estimation(100, 10_000);
        assert!(large > small);
    }
}
