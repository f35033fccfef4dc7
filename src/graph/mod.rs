//! Read-only graph sources consumed by the Pregel engine.
//!
//! The engine never mutates a graph; it only needs node count, degrees and a
//! way to visit a node's outgoing relationships. [`Graph`] is object safe so
//! that compute contexts can hold a `&dyn Graph` without threading a type
//! parameter through user callbacks.

pub mod csr;

#[cfg(test)]
mod tests;

pub use csr::{CsrGraph, Orientation};

/// Weight reported for relationships of unweighted graphs.
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// A read-only graph addressed by dense `u64` node ids `0..node_count()`.
pub trait Graph: Send + Sync {
    /// Number of nodes.
    fn node_count(&self) -> u64;

    /// Number of (directed) relationships.
    fn relationship_count(&self) -> u64;

    /// Out-degree of `node`.
    ///
    /// # Panics
    /// May panic if `node >= node_count()`.
    fn degree(&self, node: u64) -> u64;

    /// Returns `true` if relationships carry weights other than [`DEFAULT_WEIGHT`].
    fn has_relationship_weights(&self) -> bool {
        false
    }

    /// Calls `consumer(target, weight)` for each outgoing relationship of `node`
    /// until it returns `false`.
    ///
    /// # Panics
    /// May panic if `node >= node_count()`.
    fn for_each_relationship(&self, node: u64, consumer: &mut dyn FnMut(u64, f64) -> bool);
}

impl<G: Graph + ?Sized> Graph for &G {
    fn node_count(&self) -> u64 {
        (**self).node_count()
    }
    fn relationship_count(&self) -> u64 {
        (**self).relationship_count()
    }
    fn degree(&self, node: u64) -> u64 {
        (**self).degree(node)
    }
    fn has_relationship_weights(&self) -> bool {
        (**self).has_relationship_weights()
    }
    fn for_each_relationship(&self, node: u64, consumer: &mut dyn FnMut(u64, f64) -> bool) {
        (**self).for_each_relationship(node, consumer);
    }
}
