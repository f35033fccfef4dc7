//! Crate-wide error type.
//!
//! Non-convergence is deliberately absent: a run that exhausts its iteration
//! budget completes normally with `did_converge == false`.

/// Errors raised by huge arrays and by Pregel runs.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A huge-array allocation exceeded the memory budget or was refused by the host.
    #[error("cannot allocate {requested_bytes} bytes (budget: {budget_bytes} bytes)")]
    Allocation {
        /// Estimated bytes the allocation needs.
        requested_bytes: u64,
        /// Bytes the budget allowed.
        budget_bytes: u64,
    },

    /// An index was outside `0..len`.
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange {
        /// The offending index.
        index: u64,
        /// Length of the indexed structure.
        len: u64,
    },

    /// An `init` or `compute` callback returned an error.
    #[error("computation failed for node {node} in superstep {superstep}")]
    UserCompute {
        /// Node whose callback failed.
        node: u64,
        /// Superstep in which the failure occurred.
        superstep: usize,
        /// The callback's error.
        #[source]
        source: anyhow::Error,
    },

    /// The termination flag requested a stop before `superstep` started.
    #[error("run cancelled before superstep {superstep}")]
    Cancelled {
        /// The superstep that was not started.
        superstep: usize,
    },

    /// A configuration value is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The worker pool could not be created.
    #[error("failed to build worker pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    /// Returns `true` for a caller-requested stop rather than a failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
