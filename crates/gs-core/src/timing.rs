//! Lightweight wall-clock timing for build and solve phases.

use std::time::Instant;

/// A simple timer that measures elapsed time.
pub struct Timer {
    label: &'static str,
    start: Instant,
}

impl Timer {
    /// Create and start a new timer with the given label.
    pub fn start(label: &'static str) -> Self {
        Self {
            label,
            start: Instant::now(),
        }
    }

    /// Stop the timer and return elapsed time in seconds.
    pub fn stop(self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Stop the timer and emit the elapsed time at debug level.
    pub fn stop_and_log(self) -> f64 {
        let label = self.label;
        let elapsed = self.stop();
        tracing::debug!(label, elapsed_s = elapsed, "timer stopped");
        elapsed
    }
}

/// Accumulating timer for tracking total time across multiple calls.
#[derive(Clone, Debug, Default)]
pub struct AccumulatingTimer {
    total_s: f64,
    count: u64,
}

impl AccumulatingTimer {
    pub const fn new() -> Self {
        Self {
            total_s: 0.0,
            count: 0,
        }
    }

    /// Record a timing measurement.
    pub fn record(&mut self, duration_s: f64) {
        self.total_s += duration_s.max(0.0);
        self.count += 1;
    }

    /// Total time spent (in seconds).
    pub fn total_seconds(&self) -> f64 {
        self.total_s
    }

    /// Number of recorded measurements.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Average time per call (in seconds).
    pub fn average_seconds(&self) -> f64 {
        if self.count > 0 {
            self.total_s / self.count as f64
        } else {
            0.0
        }
    }

    pub fn reset(&mut self) {
        self.total_s = 0.0;
        self.count = 0;
    }
}
