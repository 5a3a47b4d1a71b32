//! Rejects a computation request while another is in flight.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{PipelineError, PipelineResult};

/// Guards a computation so that at most one runs at a time.
///
/// A request made while another is running is rejected with
/// [`PipelineError::AlreadyRunning`]; requests are never queued or
/// interleaved. The flag is cleared when the running computation returns,
/// whether it succeeds, fails or panics.
///
/// # Example
///
/// ```
/// use shape_pipeline::{PipelineError, SingleFlight};
///
/// let flight = SingleFlight::new();
/// let nested = flight.try_run(|| flight.try_run(|| Ok(1)));
/// assert!(matches!(nested, Ok(Err(PipelineError::AlreadyRunning))));
/// assert_eq!(flight.try_run(|| Ok(2)).unwrap(), 2);
/// ```
#[derive(Debug, Default)]
pub struct SingleFlight {
    running: AtomicBool,
}

struct FlightGuard<'a> {
    running: &'a AtomicBool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

impl SingleFlight {
    /// Creates an idle guard.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
        }
    }

    /// Whether a computation is in flight.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Runs `f` unless another computation is in flight.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::AlreadyRunning`] without calling `f` if a
    /// computation is in flight, otherwise whatever `f` returns.
    pub fn try_run<T>(&self, f: impl FnOnce() -> PipelineResult<T>) -> PipelineResult<T> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(PipelineError::AlreadyRunning);
        }
        let _guard = FlightGuard { running: &self.running };
        f()
    }
}
