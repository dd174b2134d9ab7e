//! Run statistics
//!
//! Timing statistics only include cycles that received data. Failed and
//! empty cycles still count towards the cycle total.

use crate::getter::CycleResult;
use std::fmt;
use std::time::Duration;

/// How a single cycle was classified when recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Positive byte total
    Success,

    /// No error, but nothing received either
    Empty,

    /// The cycle recorded an error with this code
    Failed { code: i32 },
}

/// Aggregate statistics for a whole run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    /// Shortest successful cycle
    pub min_time: Option<Duration>,

    /// Longest successful cycle
    pub max_time: Option<Duration>,

    /// Sum of successful cycle durations
    pub total_time: Duration,

    pub success_count: u64,
    pub total_count: u64,

    /// Requests completed across successful cycles
    pub total_requests: u64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one cycle into the statistics
    pub fn record(&mut self, cycle: &CycleResult) -> CycleOutcome {
        self.total_count += 1;

        if let Some(error) = &cycle.first_error {
            return CycleOutcome::Failed { code: error.code };
        }
        if cycle.total_bytes == 0 {
            return CycleOutcome::Empty;
        }

        self.min_time = Some(self.min_time.map_or(cycle.elapsed, |t| t.min(cycle.elapsed)));
        self.max_time = Some(self.max_time.map_or(cycle.elapsed, |t| t.max(cycle.elapsed)));
        self.total_time += cycle.elapsed;
        self.success_count += 1;
        self.total_requests += cycle.request_count;
        CycleOutcome::Success
    }

    /// Mean successful cycle duration, if any cycle succeeded
    pub fn avg_time(&self) -> Option<Duration> {
        if self.success_count == 0 {
            return None;
        }
        Some(self.total_time.div_f64(self.success_count as f64))
    }
}

fn seconds(duration: Option<Duration>) -> f64 {
    duration.map_or(0.0, |d| d.as_secs_f64())
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total {} successful of {} cycles. {} total requests. min/avg/max = {:.6}/{:.6}/{:.6} seconds.",
            self.success_count,
            self.total_count,
            self.total_requests,
            seconds(self.min_time),
            seconds(self.avg_time()),
            seconds(self.max_time)
        )
    }
}
