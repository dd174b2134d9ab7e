//! Cycle scheduling and run-wide accounting
//!
//! Cycles start on a fixed interval measured from the start of the previous
//! cycle. When a cycle overruns, the next one starts immediately and the
//! schedule is re-anchored to that moment rather than trying to catch up.

use super::{dispatch_cycle, CycleResult, DispatchError, ProgressMeter, UrlSource};
use crate::config::Config;
use crate::fetcher::{describe_code, Fetcher};
use crate::output::{cycle_line, CycleOutcome, RunStats};
use crate::worker::WorkerPool;
use crate::GetterError;
use chrono::Utc;
use std::io::{self, Write};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Longest single sleep between cancellation checks
pub const SLEEP_SLICE: Duration = Duration::from_millis(10);

/// Drift-aware cycle clock
#[derive(Debug)]
pub struct Ticker {
    interval: Duration,
    next_tick: Instant,
}

impl Ticker {
    /// The first tick is due immediately
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_tick: Instant::now(),
        }
    }

    pub fn next_tick(&self) -> Instant {
        self.next_tick
    }

    /// Sleeps until the next tick is due
    ///
    /// Returns the time the tick fired, or `None` if cancelled first. The
    /// following tick is scheduled one interval after the returned time.
    pub async fn wait(&mut self, cancel: &CancellationToken) -> Option<Instant> {
        loop {
            if cancel.is_cancelled() {
                return None;
            }

            let now = Instant::now();
            if now >= self.next_tick {
                self.next_tick = now + self.interval;
                return Some(now);
            }

            let slice = (self.next_tick - now).min(SLEEP_SLICE);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                _ = tokio::time::sleep(slice) => {}
            }
        }
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub stats: RunStats,

    /// Code of the first failed cycle, if any
    pub first_error: Option<i32>,

    /// The run ended because of a shutdown request
    pub cancelled: bool,
}

impl RunReport {
    /// Process exit status for this run
    pub fn exit_code(&self) -> u8 {
        match self.first_error {
            Some(code) => code.clamp(1, 255) as u8,
            None => 0,
        }
    }
}

/// Owns the run statistics and decides when a run ends
pub struct CycleScheduler<W> {
    source: UrlSource,
    ticker: Ticker,
    meter: ProgressMeter,
    run_length: Option<Duration>,
    cycle_limit: Option<u64>,
    stop_on_error: bool,
    stats: RunStats,
    first_error: Option<i32>,
    output: W,
}

impl<W: Write> CycleScheduler<W> {
    pub fn new(config: &Config, output: W) -> Self {
        Self {
            source: config.url_source(),
            ticker: Ticker::new(config.interval()),
            meter: ProgressMeter::new(config.fetch_options().progress_interval),
            run_length: config.run_length(),
            cycle_limit: config.cycle_limit(),
            stop_on_error: config.run.stop_on_error,
            stats: RunStats::new(),
            first_error: None,
            output,
        }
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Folds a finished cycle into the run and writes its report line
    ///
    /// Returns `false` when the cycle failed and the run should stop.
    pub fn record(&mut self, cycle: &CycleResult) -> io::Result<bool> {
        match self.stats.record(cycle) {
            CycleOutcome::Failed { code } => {
                tracing::error!(
                    "Cycle {} failed: {} (code {})",
                    self.stats.total_count,
                    describe_code(code),
                    code
                );
                self.first_error.get_or_insert(code);
                if self.stop_on_error {
                    tracing::info!("Stopping after failed cycle");
                    return Ok(false);
                }
            }
            CycleOutcome::Empty => {
                tracing::warn!("Cycle {}: nothing received", self.stats.total_count);
            }
            CycleOutcome::Success => {
                writeln!(self.output, "{}", cycle_line(Utc::now(), cycle))?;
                self.output.flush()?;
            }
        }
        Ok(true)
    }

    /// Runs cycles on `pool` until a limit is hit, the run is cancelled, or a
    /// fatal error occurs
    ///
    /// The pool is always stopped and the final statistics line is always
    /// written, including when a fatal error is returned.
    pub async fn run(
        mut self,
        pool: &mut WorkerPool,
        cancel: &CancellationToken,
    ) -> Result<RunReport, GetterError> {
        let deadline = self.run_length.map(|length| Instant::now() + length);
        let mut cancelled = false;
        let mut fatal: Option<GetterError> = None;

        loop {
            if self.ticker.wait(cancel).await.is_none() {
                cancelled = true;
                break;
            }

            let cycle = match dispatch_cycle(pool, &self.source, &mut self.meter, cancel).await {
                Ok(cycle) => cycle,
                Err(DispatchError::Cancelled) => {
                    cancelled = true;
                    break;
                }
                Err(e) => {
                    tracing::error!("Fatal dispatch error: {}", e);
                    fatal = Some(e.into());
                    break;
                }
            };

            match self.record(&cycle) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    fatal = Some(e.into());
                    break;
                }
            }

            if self.cycle_limit.is_some_and(|limit| self.stats.total_count >= limit) {
                tracing::debug!("Cycle limit reached");
                break;
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                tracing::debug!("Run length reached");
                break;
            }
        }

        if cancelled {
            tracing::info!("Shutdown requested, stopping workers");
        }
        pool.stop_all().await;

        let written = writeln!(self.output, "{}", self.stats).and_then(|_| self.output.flush());
        if let Some(e) = fatal {
            return Err(e);
        }
        written?;

        Ok(RunReport {
            stats: self.stats,
            first_error: self.first_error,
            cancelled,
        })
    }
}

/// Spawns a pool sized from `config` and runs cycles until the run ends
///
/// Each worker gets its own fetcher from `make_fetcher`. Report lines go to
/// `output`; progress lines go to standard output.
pub async fn run_loop<F, M, W>(
    config: &Config,
    make_fetcher: M,
    output: W,
    cancel: &CancellationToken,
) -> Result<RunReport, GetterError>
where
    F: Fetcher,
    M: FnMut(usize) -> F,
    W: Write,
{
    let mut pool = WorkerPool::spawn(config.run.workers, config.fetch_options(), make_fetcher)?;
    tracing::info!(
        "Started {} workers, cycle interval {:?}",
        pool.len(),
        config.interval()
    );

    CycleScheduler::new(config, output).run(&mut pool, cancel).await
}
