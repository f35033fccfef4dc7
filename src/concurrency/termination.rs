//! Cooperative cancellation.
//!
//! A [`TerminationFlag`] latches to "stopped" either when [`TerminationFlag::stop`]
//! is called or when its monitor reports termination. The monitor may be
//! expensive (it can consult external state), so it is consulted at most once
//! per interval, measured on a monotonic clock; between checks `running()` is a
//! single atomic load.

use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Default minimum time between two monitor checks.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(10);

const NEVER_CHECKED: u64 = u64::MAX;

/// A boolean poll telling long-running work whether to continue.
pub trait TerminationSignal: Send + Sync {
    /// Returns `false` once the caller asked to stop.
    fn running(&self) -> bool;

    /// Fails with [`Error::Cancelled`] if [`Self::running`] is `false`.
    fn assert_running(&self, superstep: usize) -> Result<()> {
        if self.running() {
            Ok(())
        } else {
            Err(Error::Cancelled { superstep })
        }
    }
}

impl<S: TerminationSignal + ?Sized> TerminationSignal for &S {
    fn running(&self) -> bool {
        (**self).running()
    }
}

impl<S: TerminationSignal + ?Sized> TerminationSignal for Arc<S> {
    fn running(&self) -> bool {
        (**self).running()
    }
}

type Monitor = Box<dyn Fn() -> bool + Send + Sync>;

/// Latching termination flag with a throttled external monitor.
pub struct TerminationFlag {
    running: AtomicBool,
    monitor: Option<Monitor>,
    interval_nanos: u64,
    origin: Instant,
    last_check: AtomicU64,
}

impl TerminationFlag {
    /// A flag that only stops through [`Self::stop`].
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            monitor: None,
            interval_nanos: duration_nanos(DEFAULT_CHECK_INTERVAL),
            origin: Instant::now(),
            last_check: AtomicU64::new(NEVER_CHECKED),
        }
    }

    /// A flag that also stops once `is_terminated` returns `true`.
    ///
    /// `is_terminated` is called on the first poll and then at most once per
    /// [`DEFAULT_CHECK_INTERVAL`].
    pub fn with_monitor(is_terminated: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Self {
            monitor: Some(Box::new(is_terminated)),
            ..Self::new()
        }
    }

    /// Sets the minimum time between monitor checks.
    pub fn check_interval(mut self, interval: Duration) -> Self {
        self.interval_nanos = duration_nanos(interval);
        self
    }

    /// Requests termination. Takes effect on the next poll.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    fn poll_monitor(&self, monitor: &Monitor) {
        let now = duration_nanos(self.origin.elapsed());
        let last = self.last_check.load(Ordering::Relaxed);
        let due = last == NEVER_CHECKED || now.saturating_sub(last) >= self.interval_nanos;
        // One poller per interval; losers keep the cached answer.
        if due
            && self
                .last_check
                .compare_exchange(last, now, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            && monitor()
        {
            tracing::debug!("termination monitor requested stop");
            self.stop();
        }
    }
}

impl Default for TerminationFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminationSignal for TerminationFlag {
    fn running(&self) -> bool {
        if !self.running.load(Ordering::Acquire) {
            return false;
        }
        if let Some(monitor) = &self.monitor {
            self.poll_monitor(monitor);
        }
        self.running.load(Ordering::Acquire)
    }
}

impl core::fmt::Debug for TerminationFlag {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TerminationFlag")
            .field("running", &self.running.load(Ordering::Relaxed))
            .field("has_monitor", &self.monitor.is_some())
            .field("interval_nanos", &self.interval_nanos)
            .finish()
    }
}

fn duration_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn stop_latches() {
        let flag = TerminationFlag::new();
        assert!(flag.running());
        assert!(flag.assert_running(0).is_ok());
        flag.stop();
        assert!(!flag.running());
        assert!(matches!(
            flag.assert_running(3),
            Err(Error::Cancelled { superstep: 3 })
        ));
    }

    #[test]
    fn monitor_is_throttled() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let flag = TerminationFlag::with_monitor(move || {
            c.fetch_add(1, Ordering::Relaxed);
            false
        })
        .check_interval(Duration::from_secs(3600));

        for _ in 0..100 {
            assert!(flag.running());
        }
        // only the first poll consults the monitor within the interval
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn monitor_with_zero_interval_is_polled_every_time() {
        let stop_after = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&stop_after);
        let flag = TerminationFlag::with_monitor(move || s.fetch_add(1, Ordering::Relaxed) >= 2)
            .check_interval(Duration::ZERO);
        assert!(flag.running());
        assert!(flag.running());
        assert!(!flag.running());
        // latched
        assert!(!flag.running());
    }

    #[test]
    fn signal_through_references() {
        let flag = Arc::new(TerminationFlag::new());
        let by_ref: &dyn TerminationSignal = &flag;
        assert!(by_ref.running());
        flag.stop();
        assert!(!by_ref.running());
    }
}
