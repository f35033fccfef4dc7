//! Handles passed to user callbacks.
//!
//! A context is bound to one node at a time; the compute step rebinds it as it
//! walks its partition. Contexts only expose the value of the node they are
//! bound to, which is what makes unsynchronized value writes from different
//! partitions sound.

use super::config::PregelConfig;
use super::messenger::Messenger;
use super::node_values::NodeValues;
use crate::concurrency::atomic::HugeAtomicBitSet;
use crate::concurrency::termination::TerminationSignal;
use crate::graph::Graph;

/// Graph access and value ownership for the bound node.
struct NodeScope<'a, V> {
    graph: &'a dyn Graph,
    values: &'a NodeValues<V>,
    config: &'a PregelConfig,
    node: u64,
}

impl<'a, V> NodeScope<'a, V> {
    fn value(&self) -> &V {
        // SAFETY: `node` lies in the partition owned by this worker, and the
        // only mutable access goes through `&mut self` on the same scope.
        unsafe { self.values.get(self.node) }
    }

    fn value_mut(&mut self) -> &mut V {
        // SAFETY: as for `value`, and `&mut self` excludes concurrent readers
        // within this worker.
        unsafe { self.values.get_mut(self.node) }
    }

    fn for_each_neighbor(&self, mut consumer: impl FnMut(u64)) {
        self.graph.for_each_relationship(self.node, &mut |target, _| {
            consumer(target);
            true
        });
    }
}

/// Context of the `init` callback, run once per node before its first `compute`.
pub struct InitContext<'a, V> {
    scope: NodeScope<'a, V>,
}

impl<'a, V> InitContext<'a, V> {
    pub(crate) fn new(graph: &'a dyn Graph, values: &'a NodeValues<V>, config: &'a PregelConfig) -> Self {
        Self {
            scope: NodeScope {
                graph,
                values,
                config,
                node: 0,
            },
        }
    }

    #[inline]
    pub(crate) fn bind(&mut self, node: u64) {
        self.scope.node = node;
    }

    /// The node being initialized.
    #[inline]
    pub fn node_id(&self) -> u64 {
        self.scope.node
    }

    /// Number of nodes in the graph.
    pub fn node_count(&self) -> u64 {
        self.scope.graph.node_count()
    }

    /// Number of relationships in the graph.
    pub fn relationship_count(&self) -> u64 {
        self.scope.graph.relationship_count()
    }

    /// Out-degree of the bound node.
    pub fn degree(&self) -> u64 {
        self.scope.graph.degree(self.scope.node)
    }

    /// The bound node's value.
    pub fn value(&self) -> &V {
        self.scope.value()
    }

    /// Mutable access to the bound node's value.
    pub fn value_mut(&mut self) -> &mut V {
        self.scope.value_mut()
    }

    /// Replaces the bound node's value.
    pub fn set_value(&mut self, value: V) {
        *self.scope.value_mut() = value;
    }

    /// Calls `consumer` with every target of the bound node.
    pub fn for_each_neighbor(&self, consumer: impl FnMut(u64)) {
        self.scope.for_each_neighbor(consumer);
    }

    /// The run's configuration.
    pub fn config(&self) -> &PregelConfig {
        self.scope.config
    }
}

/// Context of the `compute` callback.
///
/// Besides the bound node's value it can send messages, which arrive in the
/// next superstep, and vote to halt. A halted node is skipped until a message
/// wakes it up.
pub struct ComputeContext<'a, V, M> {
    scope: NodeScope<'a, V>,
    superstep: usize,
    messenger: &'a dyn Messenger<M>,
    vote_bits: &'a HugeAtomicBitSet,
    termination: &'a dyn TerminationSignal,
}

impl<'a, V, M> ComputeContext<'a, V, M> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        graph: &'a dyn Graph,
        values: &'a NodeValues<V>,
        config: &'a PregelConfig,
        superstep: usize,
        messenger: &'a dyn Messenger<M>,
        vote_bits: &'a HugeAtomicBitSet,
        termination: &'a dyn TerminationSignal,
    ) -> Self {
        Self {
            scope: NodeScope {
                graph,
                values,
                config,
                node: 0,
            },
            superstep,
            messenger,
            vote_bits,
            termination,
        }
    }

    #[inline]
    pub(crate) fn bind(&mut self, node: u64) {
        self.scope.node = node;
    }

    /// The node being computed.
    #[inline]
    pub fn node_id(&self) -> u64 {
        self.scope.node
    }

    /// Number of nodes in the graph.
    pub fn node_count(&self) -> u64 {
        self.scope.graph.node_count()
    }

    /// Number of relationships in the graph.
    pub fn relationship_count(&self) -> u64 {
        self.scope.graph.relationship_count()
    }

    /// Out-degree of the bound node.
    pub fn degree(&self) -> u64 {
        self.scope.graph.degree(self.scope.node)
    }

    /// Current superstep, starting at `0`.
    #[inline]
    pub fn superstep(&self) -> usize {
        self.superstep
    }

    /// Returns `true` during superstep `0`.
    #[inline]
    pub fn is_initial_superstep(&self) -> bool {
        self.superstep == 0
    }

    /// The bound node's value.
    pub fn value(&self) -> &V {
        self.scope.value()
    }

    /// Mutable access to the bound node's value.
    pub fn value_mut(&mut self) -> &mut V {
        self.scope.value_mut()
    }

    /// Replaces the bound node's value.
    pub fn set_value(&mut self, value: V) {
        *self.scope.value_mut() = value;
    }

    /// Calls `consumer` with every target of the bound node.
    pub fn for_each_neighbor(&self, consumer: impl FnMut(u64)) {
        self.scope.for_each_neighbor(consumer);
    }

    /// The run's configuration.
    pub fn config(&self) -> &PregelConfig {
        self.scope.config
    }

    /// Sends `message` to `target`, delivered in the next superstep.
    ///
    /// # Panics
    /// Panics if `target >= node_count()`.
    pub fn send_to(&self, target: u64, message: M) {
        self.messenger.send_to(target, message);
    }

    /// Sends a copy of `message` to every target of the bound node.
    pub fn send_to_neighbors(&self, message: M)
    where
        M: Clone,
    {
        self.scope.graph.for_each_relationship(self.scope.node, &mut |target, _| {
            self.messenger.send_to(target, message.clone());
            true
        });
    }

    /// Sends `f(target, weight)` to every target for which it returns `Some`.
    pub fn send_to_neighbors_by(&self, mut f: impl FnMut(u64, f64) -> Option<M>) {
        self.scope.graph.for_each_relationship(self.scope.node, &mut |target, weight| {
            if let Some(message) = f(target, weight) {
                self.messenger.send_to(target, message);
            }
            true
        });
    }

    /// Marks the bound node as halted. It runs again only if it receives a message.
    pub fn vote_to_halt(&mut self) {
        self.vote_bits.set(self.scope.node);
    }

    /// Polls the run's termination signal, for callbacks doing long work per node.
    pub fn is_running(&self) -> bool {
        self.termination.running()
    }
}

/// Context of the master computation, run on the driver thread after every
/// superstep with exclusive access to all node values.
pub struct MasterComputeContext<'a, V> {
    values: &'a mut NodeValues<V>,
    superstep: usize,
}

impl<'a, V> MasterComputeContext<'a, V> {
    pub(crate) fn new(values: &'a mut NodeValues<V>, superstep: usize) -> Self {
        Self { values, superstep }
    }

    /// The superstep that just finished.
    pub fn superstep(&self) -> usize {
        self.superstep
    }

    /// Number of nodes.
    pub fn node_count(&self) -> u64 {
        self.values.len()
    }

    /// Value of `node`.
    ///
    /// # Panics
    /// Panics if `node >= node_count()`.
    pub fn value(&self, node: u64) -> &V {
        // SAFETY: the context borrows the values exclusively.
        unsafe { self.values.get(node) }
    }

    /// Mutable value of `node`.
    ///
    /// # Panics
    /// Panics if `node >= node_count()`.
    pub fn value_mut(&mut self, node: u64) -> &mut V {
        self.values.get_exclusive(node)
    }

    /// Calls `f` with every node id and its value.
    pub fn for_each_value(&mut self, mut f: impl FnMut(u64, &mut V)) {
        for node in 0..self.values.len() {
            f(node, self.values.get_exclusive(node));
        }
    }
}
