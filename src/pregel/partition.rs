//! Splitting the node id space into per-worker ranges.

use core::ops::Range;

use serde::{Deserialize, Serialize};

use crate::graph::Graph;

/// A contiguous range of node ids processed by one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Partition {
    start_node: u64,
    node_count: u64,
}

impl Partition {
    /// The range `start_node..start_node + node_count`.
    pub const fn new(start_node: u64, node_count: u64) -> Self {
        Self {
            start_node,
            node_count,
        }
    }

    /// First node of the range.
    #[inline]
    pub const fn start_node(&self) -> u64 {
        self.start_node
    }

    /// Number of nodes in the range.
    #[inline]
    pub const fn node_count(&self) -> u64 {
        self.node_count
    }

    /// One past the last node of the range.
    #[inline]
    pub const fn end_node(&self) -> u64 {
        self.start_node + self.node_count
    }

    /// Node ids in ascending order.
    #[inline]
    pub fn nodes(&self) -> Range<u64> {
        self.start_node..self.end_node()
    }

    /// Returns `true` if `node` lies in this range.
    #[inline]
    pub const fn contains(&self, node: u64) -> bool {
        node >= self.start_node && node < self.end_node()
    }
}

/// How the driver splits nodes across workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partitioning {
    /// Equal node counts, see [`range_partition`].
    #[default]
    Range,
    /// Equal relationship counts, see [`degree_partition`].
    Degree,
}

impl Partitioning {
    /// Partitions `graph` for `concurrency` workers.
    ///
    /// # Panics
    /// Panics if `concurrency == 0`.
    pub fn partition(self, graph: &dyn Graph, concurrency: usize) -> Vec<Partition> {
        match self {
            Partitioning::Range => range_partition(graph.node_count(), concurrency),
            Partitioning::Degree => degree_partition(graph, concurrency),
        }
    }
}

/// Splits `[0, node_count)` into at most `concurrency` contiguous, non-empty
/// ranges of equal size; the last range takes the remainder.
///
/// Returns no partitions for `node_count == 0` and fewer than `concurrency`
/// partitions when there are fewer nodes than workers.
///
/// # Panics
/// Panics if `concurrency == 0`.
///
/// # Examples
/// ```
/// use pregel_engine::pregel::partition::range_partition;
///
/// let parts = range_partition(10, 3);
/// let sizes: Vec<u64> = parts.iter().map(|p| p.node_count()).collect();
/// assert_eq!(sizes, vec![3, 3, 4]);
/// ```
pub fn range_partition(node_count: u64, concurrency: usize) -> Vec<Partition> {
    assert!(concurrency > 0, "concurrency must be positive");
    if node_count == 0 {
        return Vec::new();
    }
    let count = (concurrency as u64).min(node_count);
    let batch = node_count / count;
    (0..count)
        .map(|i| {
            let start = i * batch;
            let len = if i + 1 == count { node_count - start } else { batch };
            Partition::new(start, len)
        })
        .collect()
}

/// Splits `[0, node_count)` into at most `concurrency` contiguous ranges with
/// roughly equal relationship counts.
///
/// A range is closed as soon as its degree sum reaches
/// `ceil(relationship_count / concurrency)`. Graphs without relationships
/// fall back to [`range_partition`].
///
/// # Panics
/// Panics if `concurrency == 0`.
pub fn degree_partition(graph: &dyn Graph, concurrency: usize) -> Vec<Partition> {
    assert!(concurrency > 0, "concurrency must be positive");
    let node_count = graph.node_count();
    let total = graph.relationship_count();
    if node_count == 0 || total == 0 {
        return range_partition(node_count, concurrency);
    }

    let target = total.div_ceil(concurrency as u64);
    let mut partitions = Vec::with_capacity(concurrency);
    let mut start = 0;
    let mut degrees = 0;
    for node in 0..node_count {
        degrees += graph.degree(node);
        if degrees >= target && partitions.len() + 1 < concurrency {
            partitions.push(Partition::new(start, node + 1 - start));
            start = node + 1;
            degrees = 0;
        }
    }
    if start < node_count {
        partitions.push(Partition::new(start, node_count - start));
    }
    partitions
}
