//! Report lines written to the output sink
//!
//! This module handles:
//! - The per-cycle line written after every successful cycle
//! - Run-wide statistics and the final summary line

pub mod stats;

pub use stats::{CycleOutcome, RunStats};

use crate::getter::CycleResult;
use chrono::{DateTime, Utc};

/// Formats the line written after a successful cycle
///
/// ```
/// use chrono::DateTime;
/// use http_getter::getter::CycleResult;
/// use http_getter::output::cycle_line;
/// use std::time::Duration;
///
/// let cycle = CycleResult {
///     total_bytes: 500,
///     request_count: 5,
///     elapsed: Duration::from_millis(125),
///     first_error: None,
/// };
/// let at = DateTime::from_timestamp(1_400_000_000, 42_000).unwrap();
/// assert_eq!(
///     cycle_line(at, &cycle),
///     "[1400000000.000042] 5 request(s) received 500 bytes in 0.125000 seconds."
/// );
/// ```
pub fn cycle_line(at: DateTime<Utc>, cycle: &CycleResult) -> String {
    format!(
        "[{}.{:06}] {} request(s) received {} bytes in {:.6} seconds.",
        at.timestamp(),
        at.timestamp_subsec_micros(),
        cycle.request_count,
        cycle.total_bytes,
        cycle.elapsed.as_secs_f64()
    )
}
