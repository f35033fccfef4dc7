//! One partition's share of a superstep.

use super::computation::PregelComputation;
use super::config::PregelConfig;
use super::context::{ComputeContext, InitContext};
use super::messenger::Messenger;
use super::node_values::NodeValues;
use super::partition::Partition;
use crate::concurrency::atomic::HugeAtomicBitSet;
use crate::concurrency::termination::TerminationSignal;
use crate::error::{Error, Result};
use crate::graph::Graph;

/// Read-only state every step of a superstep sees.
pub(crate) struct StepShared<'a, C: PregelComputation> {
    pub(crate) computation: &'a C,
    pub(crate) graph: &'a dyn Graph,
    pub(crate) config: &'a PregelConfig,
    pub(crate) values: &'a NodeValues<C::Value>,
    pub(crate) messenger: &'a dyn Messenger<C::Message>,
    pub(crate) vote_bits: &'a HugeAtomicBitSet,
    pub(crate) termination: &'a dyn TerminationSignal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StepState {
    /// No batch ran yet; the next one also initializes nodes.
    Init,
    /// A batch is running.
    Compute,
    /// Waiting for the next superstep.
    Idle,
}

/// What a step did during one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct StepReport {
    /// Nodes visited, computed or skipped.
    pub(crate) processed: u64,
    /// Nodes whose `compute` ran.
    pub(crate) computed: u64,
}

pub(crate) struct ComputeStep {
    partition: Partition,
    state: StepState,
}

impl ComputeStep {
    pub(crate) fn new(partition: Partition) -> Self {
        Self {
            partition,
            state: StepState::Init,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> StepState {
        self.state
    }

    /// Runs superstep `superstep` for every node of the partition.
    ///
    /// A node computes if it has messages or has not voted to halt; its vote
    /// bit is cleared first. The first callback error stops the batch.
    pub(crate) fn compute_batch<C: PregelComputation>(
        &mut self,
        shared: &StepShared<'_, C>,
        superstep: usize,
    ) -> Result<StepReport> {
        let initialize = self.state == StepState::Init;
        self.state = StepState::Compute;
        let report = self.visit_nodes(shared, superstep, initialize);
        self.state = StepState::Idle;
        report
    }

    fn visit_nodes<C: PregelComputation>(
        &self,
        shared: &StepShared<'_, C>,
        superstep: usize,
        initialize: bool,
    ) -> Result<StepReport> {
        let mut init_context = InitContext::new(shared.graph, shared.values, shared.config);
        let mut context = ComputeContext::new(
            shared.graph,
            shared.values,
            shared.config,
            superstep,
            shared.messenger,
            shared.vote_bits,
            shared.termination,
        );
        let mut report = StepReport::default();

        for node in self.partition.nodes() {
            if initialize {
                init_context.bind(node);
                shared
                    .computation
                    .init(&mut init_context)
                    .map_err(user_error(node, superstep))?;
            }

            let messages = shared.messenger.messages(node);
            if !messages.is_empty() || !shared.vote_bits.get(node) {
                shared.vote_bits.clear(node);
                context.bind(node);
                shared
                    .computation
                    .compute(&mut context, messages)
                    .map_err(user_error(node, superstep))?;
                report.computed += 1;
            }
            report.processed += 1;
        }
        Ok(report)
    }
}

fn user_error(node: u64, superstep: usize) -> impl FnOnce(anyhow::Error) -> Error {
    move |source| Error::UserCompute {
        node,
        superstep,
        source,
    }
}
