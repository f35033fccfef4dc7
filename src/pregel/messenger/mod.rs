//! Double-buffered message delivery between supersteps.
//!
//! Every messenger owns two buffers. Workers append to the *write* buffer
//! through `&self` while the superstep runs; `messages(node)` reads the *read*
//! buffer, which holds what was sent in the previous superstep. Between
//! supersteps the driver calls [`Messenger::swap`], which exchanges the two
//! buffer handles and clears the new write buffer. Nothing is copied.
//!
//! | Messenger | Message type | Inbox |
//! |-----------|--------------|-------|
//! | [`QueueMessenger`] | any `M: Clone` | every message, unordered |
//! | [`ReducingMessenger`] | `f64` | at most one, combined by a [`Reducer`] |

pub mod queue;
pub mod reducing;

pub use queue::QueueMessenger;
pub use reducing::{Count, Max, Min, Reducer, ReducingMessenger, Sum};

use queue::MessagePool;

use crate::error::Result;

/// Per-node message delivery with superstep `k` → `k + 1` visibility.
pub trait Messenger<M>: Send + Sync {
    /// Appends `message` to `target`'s inbox of the next superstep.
    ///
    /// Called concurrently from all workers.
    ///
    /// # Panics
    /// May panic if `target` is not a node of the graph.
    fn send_to(&self, target: u64, message: M);

    /// Messages sent to `node` during the previous superstep.
    fn messages(&self, node: u64) -> Messages<'_, M>;

    /// Returns `true` if anything was sent during the current superstep.
    fn sent_any(&self) -> bool;

    /// Fails if a message sent during the current superstep could not be stored.
    ///
    /// The driver checks this at every barrier, before [`Self::swap`].
    ///
    /// # Errors
    /// [`crate::Error::Allocation`] if message storage hit its budget or the host refused it.
    fn check_delivery(&self) -> Result<()> {
        Ok(())
    }

    /// Makes this superstep's messages readable and empties the write buffer.
    fn swap(&mut self);

    /// Estimated bytes needed for a graph of the given size.
    fn memory_estimation(node_count: u64, relationship_count: u64) -> u64
    where
        Self: Sized;
}

/// Iterator over one node's inbox.
///
/// Yields owned messages; queue inboxes clone each message out of the pool.
pub struct Messages<'a, M> {
    inner: Inner<'a, M>,
}

enum Inner<'a, M> {
    Empty,
    Queue { pool: &'a MessagePool<M>, next: u64 },
    Single(Option<M>),
}

impl<'a, M> Messages<'a, M> {
    /// An inbox without messages.
    pub fn empty() -> Self {
        Self { inner: Inner::Empty }
    }

    /// An inbox holding exactly `message`.
    pub fn single(message: M) -> Self {
        Self {
            inner: Inner::Single(Some(message)),
        }
    }

    /// Walks the slot chain starting at `head` (slot index + 1, `0` = none).
    pub(crate) fn queue(pool: &'a MessagePool<M>, head: u64) -> Self {
        Self {
            inner: Inner::Queue { pool, next: head },
        }
    }

    /// Returns `true` if no message is left.
    pub fn is_empty(&self) -> bool {
        match &self.inner {
            Inner::Empty => true,
            Inner::Queue { next, .. } => *next == 0,
            Inner::Single(message) => message.is_none(),
        }
    }
}

impl<M: Clone> Iterator for Messages<'_, M> {
    type Item = M;

    fn next(&mut self) -> Option<M> {
        match &mut self.inner {
            Inner::Empty => None,
            Inner::Queue { pool, next } => {
                if *next == 0 {
                    return None;
                }
                let (message, following) = pool.read(*next - 1);
                *next = following;
                Some(message.clone())
            }
            Inner::Single(message) => message.take(),
        }
    }
}

impl<M> core::fmt::Debug for Messages<'_, M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Messages")
            .field("is_empty", &self.is_empty())
            .finish()
    }
}
