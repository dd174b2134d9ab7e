//! Fixed-size worker pool
//!
//! The pool spawns every worker up front and never resizes. Per-cycle logic
//! lives in the dispatcher; the pool only starts and stops workers.

use super::{PoolError, WorkerError, WorkerRunner};
use crate::channel::{self, ChannelError, Command, Received, CHANNEL_BUFFER, MAX_FRAME_LEN};
use crate::fetcher::{FetchOptions, Fetcher};
use crate::state::WorkerStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{split, BufReader, DuplexStream, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Extra time a stopping worker gets beyond one fetch timeout
const STOP_GRACE: Duration = Duration::from_secs(5);

/// Coordinator-side view of one worker
pub struct WorkerHandle {
    id: usize,
    pub(crate) status: WorkerStatus,
    pub(crate) current_url: Option<String>,
    pub(crate) reader: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
    task: Option<JoinHandle<Result<(), WorkerError>>>,
}

impl WorkerHandle {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn status(&self) -> WorkerStatus {
        self.status
    }

    /// The URL most recently assigned to this worker
    pub fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }

    pub async fn send(&mut self, command: &Command) -> Result<(), ChannelError> {
        channel::send(&mut self.writer, &command.to_payload()).await
    }

    pub async fn receive(&mut self) -> Result<Received, ChannelError> {
        channel::receive(&mut self.reader, MAX_FRAME_LEN).await
    }
}

/// A fixed set of workers, in spawn order
pub struct WorkerPool {
    workers: Vec<WorkerHandle>,
    stop_timeout: Duration,
}

impl WorkerPool {
    /// Spawns `count` workers, each with its own fetcher from `make_fetcher`
    ///
    /// Every fetcher is configured before its task starts. If any of them
    /// fails, the workers already started are torn down and no pool is
    /// returned.
    pub fn spawn<F, M>(count: usize, options: FetchOptions, mut make_fetcher: M) -> Result<Self, PoolError>
    where
        F: Fetcher,
        M: FnMut(usize) -> F,
    {
        if count == 0 {
            return Err(PoolError::Empty);
        }

        let stop_timeout = options.timeout.unwrap_or_default() + STOP_GRACE;
        let options = Arc::new(options);
        let mut pool = Self {
            workers: Vec::with_capacity(count),
            stop_timeout,
        };

        for id in 0..count {
            let mut fetcher = make_fetcher(id);
            fetcher
                .configure(&options)
                .map_err(|source| PoolError::Start { id, source })?;

            let (ours, theirs) = tokio::io::duplex(CHANNEL_BUFFER);
            let (worker_read, worker_write) = split(theirs);
            let runner = WorkerRunner::new(id, fetcher, options.clone(), worker_read, worker_write);
            let task = tokio::spawn(runner.run());

            let (reader, writer) = split(ours);
            pool.workers.push(WorkerHandle {
                id,
                status: WorkerStatus::Ready,
                current_url: None,
                reader: BufReader::new(reader),
                writer,
                task: Some(task),
            });
        }

        tracing::debug!("Spawned {} workers", count);
        Ok(pool)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn workers(&self) -> &[WorkerHandle] {
        &self.workers
    }

    pub(crate) fn workers_mut(&mut self) -> &mut [WorkerHandle] {
        &mut self.workers
    }

    /// Sends `STOP` to every worker and waits for each to exit
    ///
    /// Workers still busy once the fetch timeout plus a grace period has
    /// passed, counted from the call, are aborted. Calling this again is a
    /// no-op.
    pub async fn stop_all(&mut self) {
        for worker in self.workers.iter_mut().filter(|w| w.task.is_some()) {
            if let Err(e) = worker.send(&Command::Stop).await {
                tracing::debug!("Worker {}: STOP not delivered: {}", worker.id, e);
            }
        }

        // One shared deadline, so hung workers do not add up their grace periods.
        let deadline = Instant::now() + self.stop_timeout;
        for worker in &mut self.workers {
            let Some(mut task) = worker.task.take() else {
                continue;
            };
            match tokio::time::timeout_at(deadline, &mut task).await {
                Ok(Ok(Ok(()))) => tracing::trace!("Worker {} stopped", worker.id),
                Ok(Ok(Err(e))) => tracing::warn!("Worker {} exited with error: {}", worker.id, e),
                Ok(Err(e)) => tracing::warn!("Worker {} task failed: {}", worker.id, e),
                Err(_) => {
                    tracing::warn!("Worker {} did not stop in time, aborting", worker.id);
                    task.abort();
                }
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for worker in &mut self.workers {
            if let Some(task) = worker.task.take() {
                task.abort();
            }
        }
    }
}
