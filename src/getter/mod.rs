//! Load-generation engine
//!
//! This module contains the per-cycle dispatcher and the outer scheduler:
//! - `dispatch_cycle` spreads one cycle's URLs over the worker pool
//! - `run_loop` repeats cycles at a fixed interval and aggregates statistics
//! - `ProgressMeter` turns mid-fetch reports into bits-per-second lines

mod dispatcher;
mod progress;
mod scheduler;

pub use dispatcher::dispatch_cycle;
pub use progress::{ProgressMeter, ProgressReport};
pub use scheduler::{run_loop, CycleScheduler, RunReport, Ticker, SLEEP_SLICE};

use crate::channel::{ChannelError, ProtocolError, Reply};
use std::time::Duration;
use thiserror::Error;

/// Where a cycle's URLs come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlSource {
    /// The same list every cycle
    Static(Vec<String>),

    /// A document fetched at the start of every cycle, one URL per line
    Remote(String),
}

/// The first failure seen in a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError {
    /// Native fetcher code
    pub code: i32,

    /// The URL the failure is attributed to, if any
    pub url: Option<String>,
}

/// Aggregate outcome of one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleResult {
    pub total_bytes: u64,

    /// Successful fetches, plus one for a fetched remote URL list
    pub request_count: u64,

    pub elapsed: Duration,

    pub first_error: Option<CycleError>,
}

impl CycleResult {
    /// Legacy signed status: the negated error code, or the byte total
    pub fn status(&self) -> i64 {
        match &self.first_error {
            Some(error) => -i64::from(error.code),
            None => self.total_bytes as i64,
        }
    }
}

/// Failures that end a cycle and the run with it
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("worker {id} sent an unreadable reply: {source}")]
    Protocol { id: usize, source: ProtocolError },

    #[error("worker {id} exited unexpectedly")]
    WorkerExited { id: usize },

    #[error("worker {id} sent a truncated frame")]
    Truncated { id: usize },

    #[error("worker {id} sent unexpected reply '{reply}'")]
    UnexpectedReply { id: usize, reply: Reply },

    #[error("cancelled")]
    Cancelled,
}
