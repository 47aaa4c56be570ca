//! Execution timing reported back to the host.

use std::time::Instant;

use once_cell::sync::Lazy;

static CLOCK_ANCHOR: Lazy<Instant> = Lazy::new(Instant::now);

/// Monotonic nanoseconds since the first timestamp taken in this process.
pub fn timestamp_ns() -> u64 {
    u64::try_from(CLOCK_ANCHOR.elapsed().as_nanos()).unwrap_or(u64::MAX)
}

/// The four timestamps the host expects for every request and batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutionTimestamps {
    pub exec_start_ns: u64,
    pub compute_start_ns: u64,
    pub compute_end_ns: u64,
    pub exec_end_ns: u64,
}

impl ExecutionTimestamps {
    /// Start timing an execution now.
    pub fn begin() -> Self {
        let now = timestamp_ns();
        Self {
            exec_start_ns: now,
            compute_start_ns: now,
            compute_end_ns: now,
            exec_end_ns: now,
        }
    }

    pub fn mark_compute_start(&mut self) {
        self.compute_start_ns = timestamp_ns();
    }

    pub fn mark_compute_end(&mut self) {
        self.compute_end_ns = timestamp_ns();
    }

    pub fn mark_end(&mut self) {
        self.exec_end_ns = timestamp_ns();
    }
}
