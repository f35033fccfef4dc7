//! The user side of a Pregel run.

use core::marker::PhantomData;

use super::context::{ComputeContext, InitContext, MasterComputeContext};
use super::messenger::Messages;

/// A vertex program.
///
/// `init` runs once per node in superstep `0`, right before that node's first
/// `compute`. `compute` runs for every node that received messages or has not
/// voted to halt. `master_compute` runs on the driver thread after each
/// superstep; returning `true` ends the run as converged.
///
/// Errors returned from `init` or `compute` abort the run with
/// [`crate::Error::UserCompute`].
pub trait PregelComputation: Send + Sync {
    /// Per-node state; the run returns one per node.
    type Value: Default + Send + Sync;
    /// Message payload.
    type Message: Clone + Send + Sync;

    /// Initializes the bound node.
    fn init(&self, _context: &mut InitContext<'_, Self::Value>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Processes `messages` sent to the bound node in the previous superstep.
    fn compute(
        &self,
        context: &mut ComputeContext<'_, Self::Value, Self::Message>,
        messages: Messages<'_, Self::Message>,
    ) -> anyhow::Result<()>;

    /// Inspects or rewrites values between supersteps.
    fn master_compute(&self, _context: &mut MasterComputeContext<'_, Self::Value>) -> bool {
        false
    }
}

/// A [`PregelComputation`] made of two closures, see [`fn_computation`].
pub struct FnComputation<V, M, I, C> {
    init: I,
    compute: C,
    _types: PhantomData<fn() -> (V, M)>,
}

/// Builds a computation from an `init` and a `compute` closure.
///
/// # Examples
/// ```
/// use pregel_engine::pregel::fn_computation;
///
/// // every node counts the messages it ever received
/// let _computation = fn_computation(
///     |_ctx: &mut pregel_engine::pregel::InitContext<'_, u64>| Ok(()),
///     |ctx: &mut pregel_engine::pregel::ComputeContext<'_, u64, ()>, messages| {
///         *ctx.value_mut() += messages.count() as u64;
///         if ctx.is_initial_superstep() {
///             ctx.send_to_neighbors(());
///         }
///         ctx.vote_to_halt();
///         Ok(())
///     },
/// );
/// ```
pub fn fn_computation<V, M, I, C>(init: I, compute: C) -> FnComputation<V, M, I, C>
where
    I: Fn(&mut InitContext<'_, V>) -> anyhow::Result<()> + Send + Sync,
    C: Fn(&mut ComputeContext<'_, V, M>, Messages<'_, M>) -> anyhow::Result<()> + Send + Sync,
{
    FnComputation {
        init,
        compute,
        _types: PhantomData,
    }
}

impl<V, M, I, C> PregelComputation for FnComputation<V, M, I, C>
where
    V: Default + Send + Sync,
    M: Clone + Send + Sync,
    I: Fn(&mut InitContext<'_, V>) -> anyhow::Result<()> + Send + Sync,
    C: Fn(&mut ComputeContext<'_, V, M>, Messages<'_, M>) -> anyhow::Result<()> + Send + Sync,
{
    type Value = V;
    type Message = M;

    fn init(&self, context: &mut InitContext<'_, V>) -> anyhow::Result<()> {
        (self.init)(context)
    }

    fn compute(&self, context: &mut ComputeContext<'_, V, M>, messages: Messages<'_, M>) -> anyhow::Result<()> {
        (self.compute)(context, messages)
    }
}
