//! Rate display for in-flight fetches
//!
//! Workers send `REP <delta>` frames while downloading. The meter keeps a
//! rolling window per worker and produces a report line once the window is
//! at least as long as the configured interval.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// One progress line
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    pub worker: usize,
    pub bytes: u64,
    pub elapsed: Duration,
    pub ending_at: DateTime<Utc>,
}

impl ProgressReport {
    pub fn bits_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes as f64 * 8.0 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Worker {}: {:.0} bps ({} bytes over {:.6} seconds) ending at {}.{:06}",
            self.worker,
            self.bits_per_second(),
            self.bytes,
            self.elapsed.as_secs_f64(),
            self.ending_at.timestamp(),
            self.ending_at.timestamp_subsec_micros()
        )
    }
}

#[derive(Debug)]
struct Window {
    bytes: u64,
    started: Instant,
}

/// Per-worker download windows
#[derive(Debug, Default)]
pub struct ProgressMeter {
    interval: Option<Duration>,
    windows: HashMap<usize, Window>,
}

impl ProgressMeter {
    /// `None` disables reporting entirely
    pub fn new(interval: Option<Duration>) -> Self {
        Self {
            interval,
            windows: HashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.interval.is_some()
    }

    /// Opens a fresh window for a worker that was just assigned a fetch
    pub fn start(&mut self, worker: usize) {
        if self.is_enabled() {
            self.windows.insert(
                worker,
                Window {
                    bytes: 0,
                    started: Instant::now(),
                },
            );
        }
    }

    /// Adds `delta` bytes; returns a report once the window is long enough
    pub fn record(&mut self, worker: usize, delta: u64) -> Option<ProgressReport> {
        let interval = self.interval?;
        let window = self.windows.entry(worker).or_insert_with(|| Window {
            bytes: 0,
            started: Instant::now(),
        });
        window.bytes += delta;

        let now = Instant::now();
        let elapsed = now.duration_since(window.started);
        if elapsed < interval {
            return None;
        }

        let report = ProgressReport {
            worker,
            bytes: window.bytes,
            elapsed,
            ending_at: Utc::now(),
        };
        window.bytes = 0;
        window.started = now;
        Some(report)
    }

    /// Drops the window of a worker whose fetch completed
    pub fn finish(&mut self, worker: usize) {
        self.windows.remove(&worker);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_reports_once_interval_elapsed() {
        let mut meter = ProgressMeter::new(Some(Duration::from_millis(500)));
        meter.start(1);

        assert!(meter.record(1, 1000).is_none());
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(meter.record(1, 1000).is_none());
        tokio::time::sleep(Duration::from_millis(300)).await;

        let report = meter.record(1, 500).unwrap();
        assert_eq!(report.worker, 1);
        assert_eq!(report.bytes, 2500);
        assert_eq!(report.elapsed, Duration::from_millis(500));
        assert_eq!(report.bits_per_second(), 40_000.0);

        // The window restarts after a report.
        assert!(meter.record(1, 10).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_windows_are_per_worker() {
        let mut meter = ProgressMeter::new(Some(Duration::from_millis(100)));
        meter.start(0);
        tokio::time::sleep(Duration::from_millis(100)).await;
        meter.start(1);

        assert!(meter.record(1, 100).is_none());
        assert_eq!(meter.record(0, 100).map(|r| r.bytes), Some(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_meter_never_reports() {
        let mut meter = ProgressMeter::new(None);
        meter.start(0);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(meter.record(0, 1_000_000).is_none());
    }

    #[test]
    fn test_report_line_format() {
        let report = ProgressReport {
            worker: 3,
            bytes: 125_000,
            elapsed: Duration::from_secs(1),
            ending_at: DateTime::from_timestamp(1_400_000_000, 250_000_000).unwrap(),
        };
        assert_eq!(
            report.to_string(),
            "Worker 3: 1000000 bps (125000 bytes over 1.000000 seconds) ending at 1400000000.250000"
        );
    }
}
