//! Vertex-centric, bulk-synchronous graph computation.
//!
//! ## Architecture
//!
//! ```text
//!              ┌──────────── Pregel::run (driver thread) ─────────────┐
//!              │  poll termination → superstep k → barrier → swap     │
//!              └───────┬──────────────────┬──────────────────┬────────┘
//!                      │ rayon scope      │                  │
//!               ComputeStep(p0)    ComputeStep(p1)  ...  ComputeStep(pN)
//!                      │                  │                  │
//!        init / compute callbacks, each bound to one node of its partition
//!                      │                  │                  │
//!          ┌───────────┴──────────────────┴──────────────────┴───────────┐
//!          │ NodeValues (partition-disjoint writes)                      │
//!          │ vote bits: HugeAtomicBitSet                                 │
//!          │ Messenger: write buffer (k) ⇄ read buffer (k - 1)           │
//!          └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A superstep runs every partition on its own pool task; the driver waits for
//! all of them before deciding what happens next. Messages sent in superstep
//! `k` are only readable in `k + 1`. The run converges once every node voted
//! to halt and no message is in flight.
//!
//! ## Choosing a messenger
//!
//! | Constructor | Messenger | Use when |
//! |-------------|-----------|----------|
//! | [`Pregel::new`] | [`QueueMessenger`] | compute needs every message |
//! | [`Pregel::with_reducer`] | [`ReducingMessenger`] | messages are `f64` and only their sum/min/max/count matters |

pub mod computation;
pub mod config;
pub mod context;
pub mod executor;
pub mod messenger;
pub mod partition;

mod compute_step;
mod node_values;

pub use computation::{fn_computation, FnComputation, PregelComputation};
pub use config::PregelConfig;
pub use context::{ComputeContext, InitContext, MasterComputeContext};
pub use executor::{Pregel, PregelResult, RunState};
pub use messenger::{Messages, Messenger, QueueMessenger, Reducer, ReducingMessenger};
pub use partition::{Partition, Partitioning};
