//! A compact CSR (compressed sparse row) graph stored in huge arrays.
//!
//! Memory layout:
//! - `offsets`: `HugeArray<u64>` of length `n + 1` (row offsets)
//! - `targets`: `HugeArray<u64>` of length `m`, row-major
//! - `weights`: optional `HugeArray<f64>` parallel to `targets`

use super::{Graph, DEFAULT_WEIGHT};
use crate::collections::huge::HugeArray;
use crate::error::{Error, Result};

/// How an edge list is turned into relationships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    /// `(s, t)` becomes `s -> t`.
    #[default]
    Natural,
    /// `(s, t)` becomes `t -> s`.
    Reverse,
    /// `(s, t)` becomes both `s -> t` and `t -> s`.
    Undirected,
}

/// A CSR graph.
///
/// ### Performance Characteristics
/// | Operation | Complexity | Notes |
/// |-----------|------------|-------|
/// | `from_edges` | \(O(n + m)\) | counting sort by source |
/// | `degree` | \(O(1)\) | two offset reads |
/// | `for_each_relationship` | \(O(\text{out-degree})\) | page cursor over `targets` |
pub struct CsrGraph {
    offsets: HugeArray<u64>,
    targets: HugeArray<u64>,
    weights: Option<HugeArray<f64>>,
}

impl CsrGraph {
    /// Builds a graph from adjacency lists; `adjacency[u]` are the targets of `u`.
    ///
    /// # Errors
    /// [`Error::IndexOutOfRange`] if a target is not a node; [`Error::Allocation`]
    /// if storage cannot be allocated.
    pub fn from_adjacency(adjacency: &[Vec<u64>]) -> Result<Self> {
        let n = adjacency.len() as u64;
        let mut total = 0u64;
        let offsets = HugeArray::from_fn(n + 1, |i| {
            let at = total;
            if i < n {
                total += adjacency[i as usize].len() as u64;
            }
            at
        })?;

        let mut flat = adjacency.iter().flatten();
        let targets = HugeArray::from_fn(total, |_| flat.next().copied().unwrap_or_default())?;
        Self::validated(offsets, targets, None)
    }

    /// Builds a graph from `(source, target)` pairs.
    ///
    /// # Errors
    /// [`Error::IndexOutOfRange`] if an endpoint is `>= node_count`.
    pub fn from_edges(node_count: u64, edges: &[(u64, u64)], orientation: Orientation) -> Result<Self> {
        Self::build(
            node_count,
            edges.iter().map(|&(s, t)| (s, t, DEFAULT_WEIGHT)),
            orientation,
            false,
        )
    }

    /// Builds a weighted graph from `(source, target, weight)` triples.
    ///
    /// # Errors
    /// [`Error::IndexOutOfRange`] if an endpoint is `>= node_count`.
    pub fn from_weighted_edges(
        node_count: u64,
        edges: &[(u64, u64, f64)],
        orientation: Orientation,
    ) -> Result<Self> {
        Self::build(node_count, edges.iter().copied(), orientation, true)
    }

    /// Builds a graph directly from CSR parts.
    ///
    /// # Errors
    /// [`Error::InvalidConfig`] if offsets are empty, do not start at 0, are not monotone, or do not end
    /// at `targets.len()` (or weights differ in length); [`Error::IndexOutOfRange`]
    /// if a target is not a node.
    pub fn from_csr_parts(
        offsets: HugeArray<u64>,
        targets: HugeArray<u64>,
        weights: Option<HugeArray<f64>>,
    ) -> Result<Self> {
        Self::validated(offsets, targets, weights)
    }

    fn build(
        node_count: u64,
        edges: impl Iterator<Item = (u64, u64, f64)> + Clone,
        orientation: Orientation,
        weighted: bool,
    ) -> Result<Self> {
        let oriented = move |(s, t, w): (u64, u64, f64)| {
            let (a, b) = match orientation {
                Orientation::Natural | Orientation::Undirected => ((s, t, w), (t, s, w)),
                Orientation::Reverse => ((t, s, w), (s, t, w)),
            };
            let second = (orientation == Orientation::Undirected).then_some(b);
            core::iter::once(a).chain(second)
        };

        // `u64::MAX` nodes cannot be addressed; the saturated size fails the budget check
        let mut offsets: HugeArray<u64> = HugeArray::new(node_count.saturating_add(1))?;
        for (s, t, _) in edges.clone().flat_map(oriented) {
            for endpoint in [s, t] {
                if endpoint >= node_count {
                    return Err(Error::IndexOutOfRange {
                        index: endpoint,
                        len: node_count,
                    });
                }
            }
            offsets[s + 1] += 1;
        }
        for i in 1..=node_count {
            offsets[i] += offsets[i - 1];
        }

        let total = offsets[node_count];
        let mut targets: HugeArray<u64> = HugeArray::new(total)?;
        let mut weights: Option<HugeArray<f64>> = if weighted {
            Some(HugeArray::new(total)?)
        } else {
            None
        };
        let mut insert_at = offsets.clone();
        for (s, t, w) in edges.flat_map(oriented) {
            let at = insert_at[s];
            insert_at[s] += 1;
            targets[at] = t;
            if let Some(weights) = weights.as_mut() {
                weights[at] = w;
            }
        }

        Ok(Self {
            offsets,
            targets,
            weights,
        })
    }

    fn validated(
        offsets: HugeArray<u64>,
        targets: HugeArray<u64>,
        weights: Option<HugeArray<f64>>,
    ) -> Result<Self> {
        if offsets.is_empty() {
            return Err(Error::InvalidConfig("offsets must have length n + 1".into()));
        }
        let n = offsets.len() - 1;
        if offsets[0] != 0 {
            return Err(Error::InvalidConfig(format!(
                "first offset must be 0, got {}",
                offsets[0]
            )));
        }
        let mut previous = 0u64;
        for &o in offsets.iter() {
            if o < previous {
                return Err(Error::InvalidConfig("offsets must be monotone".into()));
            }
            previous = o;
        }
        if previous != targets.len() {
            return Err(Error::InvalidConfig(format!(
                "last offset {previous} must equal relationship count {}",
                targets.len()
            )));
        }
        if let Some(w) = &weights {
            if w.len() != targets.len() {
                return Err(Error::InvalidConfig("weights must parallel targets".into()));
            }
        }
        if let Some(&bad) = targets.iter().find(|&&t| t >= n) {
            return Err(Error::IndexOutOfRange { index: bad, len: n });
        }
        Ok(Self {
            offsets,
            targets,
            weights,
        })
    }

    /// Targets of `node`, in insertion order.
    ///
    /// # Panics
    /// Panics if `node >= node_count()`.
    pub fn neighbors(&self, node: u64) -> impl Iterator<Item = u64> + '_ {
        let (start, end) = self.range(node);
        (start..end).map(move |i| self.targets[i])
    }

    #[inline(always)]
    fn range(&self, node: u64) -> (u64, u64) {
        (self.offsets[node], self.offsets[node + 1])
    }
}

impl Graph for CsrGraph {
    fn node_count(&self) -> u64 {
        // `offsets` is length `n + 1` by construction.
        self.offsets.len() - 1
    }

    fn relationship_count(&self) -> u64 {
        self.targets.len()
    }

    #[inline]
    fn degree(&self, node: u64) -> u64 {
        let (start, end) = self.range(node);
        end - start
    }

    fn has_relationship_weights(&self) -> bool {
        self.weights.is_some()
    }

    fn for_each_relationship(&self, node: u64, consumer: &mut dyn FnMut(u64, f64) -> bool) {
        let (start, end) = self.range(node);
        let mut cursor = self.targets.cursor_range(start, end);
        while cursor.next() {
            let first = cursor.slice_start();
            for (i, &target) in cursor.slice().iter().enumerate() {
                let weight = self
                    .weights
                    .as_ref()
                    .map_or(DEFAULT_WEIGHT, |w| w[first + i as u64]);
                if !consumer(target, weight) {
                    return;
                }
            }
        }
    }
}

impl core::fmt::Debug for CsrGraph {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CsrGraph")
            .field("node_count", &self.node_count())
            .field("relationship_count", &self.relationship_count())
            .field("weighted", &self.weights.is_some())
            .finish()
    }
}
