//! Workers and the pool that owns them
//!
//! Each worker is a tokio task running [`WorkerRunner`] over a private
//! in-memory byte stream. The coordinator keeps one [`WorkerHandle`] per
//! worker inside a [`WorkerPool`].

mod pool;
mod runner;

pub use pool::{WorkerHandle, WorkerPool};
pub use runner::WorkerRunner;

use crate::channel::{ChannelError, ProtocolError};
use crate::fetcher::FetchError;
use thiserror::Error;

/// Why a worker task ended abnormally
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Pool lifecycle errors
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker pool needs at least one worker")]
    Empty,

    #[error("failed to start worker {id}: {source}")]
    Start { id: usize, source: FetchError },
}
