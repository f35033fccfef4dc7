//! The superstep driver.

use tracing::{debug, info, warn};

use super::computation::PregelComputation;
use super::compute_step::{ComputeStep, StepReport, StepShared};
use super::config::PregelConfig;
use super::context::MasterComputeContext;
use super::messenger::{Messenger, QueueMessenger, Reducer, ReducingMessenger};
use super::node_values::NodeValues;
use crate::collections::huge::{HugeArray, MemoryBudget};
use crate::concurrency::atomic::HugeAtomicBitSet;
use crate::concurrency::termination::{TerminationFlag, TerminationSignal};
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::progress::{NoopProgress, ProgressTracker};

const TASK_NAME: &str = "Pregel";

/// Lifecycle of a run.
///
/// `NotStarted → Running(k) → Running(k + 1) | Converged | MaxIterationsReached | Cancelled`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// `run` was not called yet.
    NotStarted,
    /// Superstep `k` is executing.
    Running(usize),
    /// Every node halted and no message was in flight, or the master
    /// computation ended the run.
    Converged,
    /// `max_iterations` supersteps ran without convergence.
    MaxIterationsReached,
    /// The termination signal stopped the run.
    Cancelled,
}

/// Outcome of a completed run.
#[derive(Debug)]
pub struct PregelResult<V> {
    /// Final value of every node.
    pub node_values: HugeArray<V>,
    /// Number of supersteps executed.
    pub ran_iterations: usize,
    /// `true` if the run stopped by converging rather than by exhausting
    /// `max_iterations`.
    pub did_converge: bool,
    /// [`RunState::Converged`] or [`RunState::MaxIterationsReached`].
    pub state: RunState,
}

/// A configured Pregel run over `graph`.
///
/// ```
/// use pregel_engine::graph::{CsrGraph, Orientation};
/// use pregel_engine::pregel::{fn_computation, ComputeContext, InitContext, Pregel, PregelConfig};
///
/// // propagate the smallest node id through an undirected path
/// let graph = CsrGraph::from_edges(4, &[(0, 1), (1, 2), (2, 3)], Orientation::Undirected).unwrap();
/// let computation = fn_computation(
///     |ctx: &mut InitContext<'_, u64>| {
///         let id = ctx.node_id();
///         ctx.set_value(id);
///         Ok(())
///     },
///     |ctx: &mut ComputeContext<'_, u64, u64>, messages| {
///         let best = messages.fold(*ctx.value(), u64::min);
///         if ctx.is_initial_superstep() || best < *ctx.value() {
///             ctx.set_value(best);
///             ctx.send_to_neighbors(best);
///         }
///         ctx.vote_to_halt();
///         Ok(())
///     },
/// );
///
/// let result = Pregel::new(&graph, PregelConfig::default().concurrency(2), computation)
///     .unwrap()
///     .run()
///     .unwrap();
/// assert!(result.did_converge);
/// assert_eq!(result.node_values.to_vec(), vec![0, 0, 0, 0]);
/// ```
pub struct Pregel<'g, G, C, Msgr = QueueMessenger<<C as PregelComputation>::Message>>
where
    G: Graph,
    C: PregelComputation,
{
    graph: &'g G,
    config: PregelConfig,
    computation: C,
    messenger: Msgr,
    progress: Box<dyn ProgressTracker + 'g>,
    termination: Box<dyn TerminationSignal + 'g>,
}

impl<'g, G, C> Pregel<'g, G, C>
where
    G: Graph,
    C: PregelComputation,
{
    /// Prepares a run delivering every message through a [`QueueMessenger`].
    ///
    /// # Errors
    /// [`Error::InvalidConfig`] for an unusable configuration;
    /// [`Error::Allocation`] if [`Self::memory_estimation`] exceeds the budget.
    pub fn new(graph: &'g G, config: PregelConfig, computation: C) -> Result<Self> {
        Self::check(graph, &config)?;
        let budget = Self::messenger_budget(graph, &config);
        let messenger = QueueMessenger::with_budget(graph.node_count(), &budget)?;
        Ok(Self::assemble(graph, config, computation, messenger))
    }
}

impl<'g, G, C, R> Pregel<'g, G, C, ReducingMessenger<R>>
where
    G: Graph,
    C: PregelComputation<Message = f64>,
    R: Reducer,
{
    /// Prepares a run folding all messages for a node into one with `reducer`.
    ///
    /// # Errors
    /// As for [`Pregel::new`].
    pub fn with_reducer(graph: &'g G, config: PregelConfig, computation: C, reducer: R) -> Result<Self> {
        Self::check(graph, &config)?;
        let budget = Self::messenger_budget(graph, &config);
        let messenger = ReducingMessenger::with_budget(graph.node_count(), reducer, &budget)?;
        Ok(Self::assemble(graph, config, computation, messenger))
    }
}

impl<'g, G, C, Msgr> Pregel<'g, G, C, Msgr>
where
    G: Graph,
    C: PregelComputation,
    Msgr: Messenger<C::Message>,
{
    fn check(graph: &G, config: &PregelConfig) -> Result<()> {
        config.validate()?;
        config
            .memory_budget
            .check(Self::memory_estimation(graph.node_count(), graph.relationship_count()))
    }

    /// The run budget minus what node values and vote bits take.
    fn messenger_budget(graph: &G, config: &PregelConfig) -> MemoryBudget {
        let node_count = graph.node_count();
        let fixed = NodeValues::<C::Value>::memory_estimation(node_count)
            .saturating_add(HugeAtomicBitSet::memory_estimation(node_count));
        config.memory_budget.remaining_after(fixed)
    }

    fn assemble(graph: &'g G, config: PregelConfig, computation: C, messenger: Msgr) -> Self {
        Self {
            graph,
            config,
            computation,
            messenger,
            progress: Box::new(NoopProgress),
            termination: Box::new(TerminationFlag::new()),
        }
    }

    /// Estimated peak bytes of a run: node values, vote bits and both message buffers.
    pub fn memory_estimation(node_count: u64, relationship_count: u64) -> u64 {
        NodeValues::<C::Value>::memory_estimation(node_count)
            .saturating_add(HugeAtomicBitSet::memory_estimation(node_count))
            .saturating_add(Msgr::memory_estimation(node_count, relationship_count))
    }

    /// Reports task boundaries and processed nodes to `progress`.
    pub fn with_progress_tracker(mut self, progress: impl ProgressTracker + 'g) -> Self {
        self.progress = Box::new(progress);
        self
    }

    /// Stops the run before the next superstep once `termination` reports
    /// `running() == false`.
    pub fn with_termination(mut self, termination: impl TerminationSignal + 'g) -> Self {
        self.termination = Box::new(termination);
        self
    }

    /// The run's configuration.
    pub fn config(&self) -> &PregelConfig {
        &self.config
    }

    /// Runs supersteps until convergence, `max_iterations`, an error or cancellation.
    ///
    /// # Errors
    /// - [`Error::Cancelled`] if the termination signal stopped the run;
    /// - [`Error::UserCompute`] for the first failing callback (by partition order);
    /// - [`Error::Allocation`] / [`Error::ThreadPool`] if setup fails.
    ///
    /// Node values of a failed run are dropped.
    ///
    /// # Panics
    /// A panic inside a callback is propagated to the caller.
    pub fn run(mut self) -> Result<PregelResult<C::Value>> {
        let node_count = self.graph.node_count();
        let concurrency = self.config.concurrency;
        let max_iterations = self.config.max_iterations;

        let mut values = NodeValues::new(node_count, &self.config.memory_budget)?;
        let vote_bits = HugeAtomicBitSet::with_budget(node_count, &self.config.memory_budget)?;
        let partitions = self.config.partitioning.partition(self.graph, concurrency);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(concurrency)
            .thread_name(|i| format!("pregel-worker-{i}"))
            .build()?;
        let mut steps: Vec<ComputeStep> = partitions.iter().copied().map(ComputeStep::new).collect();

        info!(
            node_count,
            relationship_count = self.graph.relationship_count(),
            partitions = partitions.len(),
            concurrency,
            max_iterations,
            "pregel run starting"
        );
        self.progress
            .set_volume(node_count.saturating_mul(max_iterations as u64));
        self.progress.begin_sub_task(TASK_NAME);

        let mut state = RunState::NotStarted;
        let mut superstep = 0;
        loop {
            if !self.termination.running() {
                advance(&mut state, RunState::Cancelled);
                warn!(superstep, "pregel run cancelled");
                self.progress.end_sub_task_with_failure(TASK_NAME);
                return Err(Error::Cancelled { superstep });
            }
            if superstep >= max_iterations {
                advance(&mut state, RunState::MaxIterationsReached);
                break;
            }
            advance(&mut state, RunState::Running(superstep));

            let step_name = format!("Superstep {superstep}");
            self.progress.begin_sub_task(&step_name);
            let shared = StepShared {
                computation: &self.computation,
                graph: self.graph,
                config: &self.config,
                values: &values,
                messenger: &self.messenger,
                vote_bits: &vote_bits,
                termination: &*self.termination,
            };
            let reports = run_superstep(&pool, &mut steps, &shared, superstep);

            let mut total = StepReport::default();
            for report in reports {
                match report {
                    Ok(report) => {
                        total.processed += report.processed;
                        total.computed += report.computed;
                    }
                    Err(e) => {
                        warn!(superstep, error = %e, "pregel superstep failed");
                        self.progress.end_sub_task_with_failure(&step_name);
                        self.progress.end_sub_task_with_failure(TASK_NAME);
                        return Err(e);
                    }
                }
            }
            if let Err(e) = self.messenger.check_delivery() {
                warn!(superstep, error = %e, "pregel messages could not be stored");
                self.progress.end_sub_task_with_failure(&step_name);
                self.progress.end_sub_task_with_failure(TASK_NAME);
                return Err(e);
            }
            self.progress.log_progress(total.processed);
            self.progress.end_sub_task(&step_name);

            let sent_messages = self.messenger.sent_any();
            let all_halted = vote_bits.all_set();
            debug!(
                superstep,
                processed = total.processed,
                computed = total.computed,
                sent_messages,
                all_halted,
                "superstep finished"
            );

            let master_halted = self
                .computation
                .master_compute(&mut MasterComputeContext::new(&mut values, superstep));
            if master_halted || (all_halted && !sent_messages) {
                advance(&mut state, RunState::Converged);
                superstep += 1;
                break;
            }

            self.messenger.swap();
            superstep += 1;
        }

        self.progress.end_sub_task(TASK_NAME);
        let did_converge = state == RunState::Converged;
        info!(ran_iterations = superstep, did_converge, "pregel run finished");

        Ok(PregelResult {
            node_values: values.into_values(),
            ran_iterations: superstep,
            did_converge,
            state,
        })
    }
}

fn advance(state: &mut RunState, next: RunState) {
    tracing::trace!(from = ?*state, to = ?next, "pregel state change");
    *state = next;
}

/// Runs every step on its own pool task and waits for all of them.
///
/// Results are returned in partition order.
fn run_superstep<C: PregelComputation>(
    pool: &rayon::ThreadPool,
    steps: &mut [ComputeStep],
    shared: &StepShared<'_, C>,
    superstep: usize,
) -> Vec<Result<StepReport>> {
    let mut reports: Vec<Option<Result<StepReport>>> = steps.iter().map(|_| None).collect();
    pool.scope(|scope| {
        for (step, slot) in steps.iter_mut().zip(reports.iter_mut()) {
            scope.spawn(move |_| *slot = Some(step.compute_batch(shared, superstep)));
        }
    });
    reports.into_iter().flatten().collect()
}
