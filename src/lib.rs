//! # `pregel-engine` - Paged-memory BSP graph engine
//!
//! An in-process engine for vertex-centric, bulk-synchronous-parallel
//! ("Pregel-style") graph algorithms over graphs addressed by `u64` node ids,
//! together with the paged memory layer it runs on.
//!
//! ## Guarantees
//!
//! ### Memory
//! - **Paged storage**: every node-indexed structure is split into power-of-two
//!   pages, so no single allocation grows with the graph and the last page is
//!   only as long as it needs to be.
//! - **Budgeted allocation**: huge arrays and whole runs are checked against a
//!   [`MemoryBudget`] before allocating; host allocation failure surfaces as
//!   [`Error::Allocation`] instead of aborting.
//!
//! ### Concurrency
//! - **No locks**: state shared between workers is either partition-disjoint
//!   or lives in atomic huge arrays updated by compare-and-swap retry.
//! - **One barrier per superstep**: partitions run fully in parallel; the
//!   driver joins all of them before the next superstep starts.
//! - **Synchronous messaging**: a message sent in superstep `k` is visible in
//!   superstep `k + 1` and never earlier.
//!
//! ## Architecture
//!
//! ```text
//! collections::huge   HugeArray<T>, HugeCursor, PageLayout, MemoryBudget
//!        │
//! concurrency         HugeAtomic{Long,Double}Array, HugeAtomicBitSet, TerminationFlag
//!        │
//! graph               Graph trait, CsrGraph
//!        │
//! pregel              Partition → Messenger → ComputeStep → Pregel driver
//! ```
//!
//! ### Run invariants
//!
//! **Invariant 1 (Addressing)**: with pages of `2^p` elements, index `i` lives at
//! page `i >> p`, offset `i & (2^p - 1)`; each valid index has exactly one slot.
//!
//! **Invariant 2 (Cover)**: the partitions of a run are contiguous, disjoint,
//! non-empty, ordered and cover `[0, node_count)`.
//!
//! **Invariant 3 (Activation)**: a node computes in superstep `k` iff it received
//! messages sent in `k - 1` or has not voted to halt.
//!
//! **Invariant 4 (Convergence)**: a run converges after the first superstep in
//! which every node voted to halt and no message was sent.
//!
//! ## Example
//!
//! ```rust
//! use pregel_engine::graph::{CsrGraph, Orientation};
//! use pregel_engine::pregel::{fn_computation, ComputeContext, InitContext, Pregel, PregelConfig};
//!
//! // every node learns its in-degree
//! let graph = CsrGraph::from_edges(3, &[(0, 2), (1, 2), (2, 0)], Orientation::Natural).unwrap();
//! let computation = fn_computation(
//!     |_ctx: &mut InitContext<'_, u64>| Ok(()),
//!     |ctx: &mut ComputeContext<'_, u64, ()>, messages| {
//!         if ctx.is_initial_superstep() {
//!             ctx.send_to_neighbors(());
//!         } else {
//!             ctx.set_value(messages.count() as u64);
//!         }
//!         ctx.vote_to_halt();
//!         Ok(())
//!     },
//! );
//!
//! let result = Pregel::new(&graph, PregelConfig::default(), computation)
//!     .unwrap()
//!     .run()
//!     .unwrap();
//! assert_eq!(result.node_values.to_vec(), vec![1, 0, 2]);
//! assert_eq!(result.ran_iterations, 2);
//! ```

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]

pub mod collections;
pub mod concurrency;
pub mod error;
pub mod graph;
pub mod pregel;
pub mod progress;

pub use collections::{HugeArray, HugeCursor, MemoryBudget, PageLayout};
pub use concurrency::atomic::{HugeAtomicBitSet, HugeAtomicDoubleArray, HugeAtomicLongArray};
pub use concurrency::{TerminationFlag, TerminationSignal};
pub use error::{Error, Result};
pub use graph::{CsrGraph, Graph, Orientation};
pub use pregel::{
    fn_computation,
    ComputeContext,
    InitContext,
    MasterComputeContext,
    Messages,
    Pregel,
    PregelComputation,
    PregelConfig,
    PregelResult,
    RunState,
};
pub use progress::{LoggingProgressTracker, NoopProgress, ProgressTracker};

// Compile-time assertions for the layout claims above.
const _: () = {
    use core::mem;

    // Pages hold a power of two of elements for every primitive the engine stores.
    const PAGE_BYTES: u64 = collections::huge::PAGE_SIZE_IN_BYTES as u64;
    assert!(PageLayout::of::<u64>().page_size() * mem::size_of::<u64>() as u64 == PAGE_BYTES);
    assert!(PageLayout::of::<u8>().page_size() == PAGE_BYTES);

    // Partitions are passed by value to every worker.
    assert!(mem::size_of::<pregel::Partition>() == 2 * mem::size_of::<u64>());
};
