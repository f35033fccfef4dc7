//! Progress reporting.
//!
//! The executor brackets a run and each superstep with
//! `begin_sub_task` / `end_sub_task` and reports processed nodes through
//! `log_progress` after every superstep barrier. Sinks are called from the
//! driver thread only, but take `&self` so they can be shared with the caller.

use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Receiver of task and progress events.
pub trait ProgressTracker: Send + Sync {
    /// Announces the expected total amount of work for the current task.
    fn set_volume(&self, _volume: u64) {}

    /// A (sub)task starts.
    fn begin_sub_task(&self, name: &str);

    /// `amount` units of work completed.
    fn log_progress(&self, amount: u64);

    /// A (sub)task finished normally.
    fn end_sub_task(&self, name: &str);

    /// A (sub)task stopped early (error or cancellation).
    fn end_sub_task_with_failure(&self, name: &str) {
        self.end_sub_task(name);
    }
}

impl<P: ProgressTracker + ?Sized> ProgressTracker for &P {
    fn set_volume(&self, volume: u64) {
        (**self).set_volume(volume);
    }
    fn begin_sub_task(&self, name: &str) {
        (**self).begin_sub_task(name);
    }
    fn log_progress(&self, amount: u64) {
        (**self).log_progress(amount);
    }
    fn end_sub_task(&self, name: &str) {
        (**self).end_sub_task(name);
    }
    fn end_sub_task_with_failure(&self, name: &str) {
        (**self).end_sub_task_with_failure(name);
    }
}

impl<P: ProgressTracker + ?Sized> ProgressTracker for Arc<P> {
    fn set_volume(&self, volume: u64) {
        (**self).set_volume(volume);
    }
    fn begin_sub_task(&self, name: &str) {
        (**self).begin_sub_task(name);
    }
    fn log_progress(&self, amount: u64) {
        (**self).log_progress(amount);
    }
    fn end_sub_task(&self, name: &str) {
        (**self).end_sub_task(name);
    }
    fn end_sub_task_with_failure(&self, name: &str) {
        (**self).end_sub_task_with_failure(name);
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressTracker for NoopProgress {
    fn begin_sub_task(&self, _name: &str) {}
    fn log_progress(&self, _amount: u64) {}
    fn end_sub_task(&self, _name: &str) {}
}

/// Emits `tracing` events: task boundaries and whole-percent progress steps.
#[derive(Debug)]
pub struct LoggingProgressTracker {
    task: String,
    volume: AtomicU64,
    done: AtomicU64,
    last_percent: AtomicU64,
}

impl LoggingProgressTracker {
    /// Creates a tracker prefixing every line with `task`.
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            volume: AtomicU64::new(0),
            done: AtomicU64::new(0),
            last_percent: AtomicU64::new(0),
        }
    }

    /// Units of work reported so far.
    pub fn progress(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }
}

impl ProgressTracker for LoggingProgressTracker {
    fn set_volume(&self, volume: u64) {
        self.volume.store(volume, Ordering::Relaxed);
        self.done.store(0, Ordering::Relaxed);
        self.last_percent.store(0, Ordering::Relaxed);
    }

    fn begin_sub_task(&self, name: &str) {
        tracing::info!(task = %self.task, "{name} :: Start");
    }

    fn log_progress(&self, amount: u64) {
        let previous = match self
            .done
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| Some(d.saturating_add(amount)))
        {
            Ok(previous) | Err(previous) => previous,
        };
        let done = previous.saturating_add(amount);
        let volume = self.volume.load(Ordering::Relaxed);
        if volume == 0 {
            return;
        }
        let percent = percent_of(done, volume);
        if percent > self.last_percent.fetch_max(percent, Ordering::Relaxed) {
            tracing::info!(task = %self.task, "{percent}%");
        }
    }

    fn end_sub_task(&self, name: &str) {
        tracing::info!(task = %self.task, "{name} :: Finished");
    }

    fn end_sub_task_with_failure(&self, name: &str) {
        tracing::warn!(task = %self.task, "{name} :: Failed");
    }
}

/// Whole percent of `volume` covered by `done`, clamped to 100.
///
/// Widened to `u128` so volumes close to `u64::MAX` do not overflow.
fn percent_of(done: u64, volume: u64) -> u64 {
    (u128::from(done.min(volume)) * 100 / u128::from(volume)) as u64
}
