//! Progress reporting for long-running workflows.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::debug;

/// Receives the completed fraction of a workflow.
///
/// Implementations must not fail; a sink that cannot deliver a report
/// drops it.
pub trait ProgressSink: Send + Sync {
    /// Called with a fraction in `[0, 1]` after each completed unit of
    /// work. Successive calls within one run never decrease.
    fn report(&self, fraction: f64);
}

/// Default sink: logs each report at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, fraction: f64) {
        debug!(percent = format_args!("{:.1}", fraction * 100.0), "Progress");
    }
}

impl<F: Fn(f64) + Send + Sync> ProgressSink for F {
    fn report(&self, fraction: f64) {
        self(fraction);
    }
}

/// Counts completed units out of a fixed total and forwards the fraction.
pub struct ProgressTracker {
    total: usize,
    done: AtomicUsize,
    sink: Arc<dyn ProgressSink>,
}

impl ProgressTracker {
    /// Creates a tracker for `total` units.
    #[must_use]
    pub fn new(total: usize, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            total,
            done: AtomicUsize::new(0),
            sink,
        }
    }

    /// Marks `units` more units complete and reports the new fraction.
    pub fn advance(&self, units: usize) {
        let done = self.done.fetch_add(units, Ordering::AcqRel) + units;
        self.sink.report(self.fraction_of(done));
    }

    /// Reports completion regardless of the unit count.
    pub fn finish(&self) {
        self.done.store(self.total, Ordering::Release);
        self.sink.report(1.0);
    }

    /// Fraction completed so far.
    #[must_use]
    pub fn fraction(&self) -> f64 {
        self.fraction_of(self.done.load(Ordering::Acquire))
    }

    #[allow(clippy::cast_precision_loss)]
    fn fraction_of(&self, done: usize) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            (done as f64 / self.total as f64).min(1.0)
        }
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("total", &self.total)
            .field("done", &self.done.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn fractions_increase_to_one() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            move |f: f64| seen.lock().unwrap().push(f)
        };
        let tracker = ProgressTracker::new(4, Arc::new(sink));
        tracker.advance(1);
        tracker.advance(2);
        tracker.advance(3);
        tracker.finish();

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![0.25, 0.75, 1.0, 1.0]);
    }

    #[test]
    fn empty_total_is_complete() {
        let tracker = ProgressTracker::new(0, Arc::new(LogProgress));
        assert_eq!(tracker.fraction(), 1.0);
    }
}
