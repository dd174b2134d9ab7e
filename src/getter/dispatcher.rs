//! One cycle of load balancing across the worker pool
//!
//! The dispatcher is the only writer of worker status. A worker is marked
//! `Working` when it is sent a request and `Ready` again when its `OK` or `ERR`
//! arrives; `REP` frames in between leave it `Working`.

use super::{CycleError, CycleResult, DispatchError, ProgressMeter, UrlSource};
use crate::channel::{protocol::payload_text, Command, Received, Reply};
use crate::fetcher::{describe_code, MAX_URLS};
use crate::state::WorkerStatus;
use crate::worker::{WorkerHandle, WorkerPool};
use futures::future::{self, FutureExt};
use tokio::io::AsyncBufReadExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Runs one cycle: reset every worker, resolve the URL set, fetch it all
///
/// Per-request failures are recorded in [`CycleResult::first_error`] and do
/// not stop the cycle; a failed reset or URL-list fetch ends the cycle early
/// with the error recorded. Channel and protocol failures are returned as
/// [`DispatchError`].
pub async fn dispatch_cycle(
    pool: &mut WorkerPool,
    source: &UrlSource,
    meter: &mut ProgressMeter,
    cancel: &CancellationToken,
) -> Result<CycleResult, DispatchError> {
    let started = Instant::now();
    let mut cycle = CycleResult::default();

    if let Some(error) = reset_workers(pool, cancel).await? {
        cycle.first_error = Some(error);
        cycle.elapsed = started.elapsed();
        return Ok(cycle);
    }

    let fetched;
    let urls: &[String] = match source {
        UrlSource::Static(urls) => urls,
        UrlSource::Remote(location) => {
            let designated = &mut pool.workers_mut()[0];
            match fetch_url_list(designated, location, &mut cycle, cancel).await? {
                Some(list) => {
                    fetched = list;
                    &fetched
                }
                None => {
                    cycle.elapsed = started.elapsed();
                    return Ok(cycle);
                }
            }
        }
    };

    let mut pending = urls.iter().peekable();
    loop {
        for worker in pool.workers_mut() {
            if pending.peek().is_none() {
                break;
            }
            if worker.status.is_ready() {
                if let Some(url) = pending.next() {
                    assign(worker, url, meter).await?;
                }
            }
        }

        let ready = wait_readable(pool.workers_mut(), cancel).await?;
        if ready.is_empty() {
            break;
        }

        for idx in ready {
            let worker = &mut pool.workers_mut()[idx];
            handle_reply(worker, &mut cycle, meter).await?;
        }
    }

    cycle.elapsed = started.elapsed();
    tracing::debug!(
        "Cycle finished: {} requests, {} bytes in {:?}",
        cycle.request_count,
        cycle.total_bytes,
        cycle.elapsed
    );
    Ok(cycle)
}

/// Sends `RESET` to every worker in pool order and waits for each reply
async fn reset_workers(
    pool: &mut WorkerPool,
    cancel: &CancellationToken,
) -> Result<Option<CycleError>, DispatchError> {
    for worker in pool.workers_mut() {
        worker.send(&Command::Reset).await?;
        match expect_reply(worker, cancel).await? {
            Reply::Ok => worker.status = WorkerStatus::Ready,
            Reply::Err { code } => {
                tracing::error!(
                    "Worker {}: reset failed: {} (code {})",
                    worker.id(),
                    describe_code(code),
                    code
                );
                return Ok(Some(CycleError { code, url: None }));
            }
            reply => return Err(DispatchError::UnexpectedReply { id: worker.id(), reply }),
        }
    }
    Ok(None)
}

/// Asks one worker for the remote URL list and collects the URLs it returns
///
/// Returns `None` when the list could not be fetched; the error is recorded
/// in `cycle`.
async fn fetch_url_list(
    worker: &mut WorkerHandle,
    location: &str,
    cycle: &mut CycleResult,
    cancel: &CancellationToken,
) -> Result<Option<Vec<String>>, DispatchError> {
    worker.send(&Command::UrlList(location.to_string())).await?;
    worker.status = WorkerStatus::Working;
    worker.current_url = Some(location.to_string());

    let reply = expect_reply(worker, cancel).await?;
    match reply {
        Reply::Listed { bytes, urls } => {
            let mut list = Vec::with_capacity(urls.min(MAX_URLS));
            for _ in 0..urls {
                let payload = expect_frame(worker).await?;
                let url = payload_text(&payload).map_err(|source| DispatchError::Protocol {
                    id: worker.id(),
                    source,
                })?;
                list.push(url.to_string());
            }
            worker.status = WorkerStatus::Ready;
            cycle.total_bytes += bytes;
            cycle.request_count += 1;
            tracing::debug!("Fetched {} URLs from {}", list.len(), location);
            Ok(Some(list))
        }
        Reply::Err { code } => {
            worker.status = WorkerStatus::Ready;
            tracing::error!(
                "Error getting URL list {}: {} (code {})",
                location,
                describe_code(code),
                code
            );
            cycle.first_error = Some(CycleError {
                code,
                url: Some(location.to_string()),
            });
            Ok(None)
        }
        reply => Err(DispatchError::UnexpectedReply { id: worker.id(), reply }),
    }
}

async fn assign(
    worker: &mut WorkerHandle,
    url: &str,
    meter: &mut ProgressMeter,
) -> Result<(), DispatchError> {
    debug_assert!(worker.status.is_ready(), "worker {} double-assigned", worker.id());
    worker.send(&Command::Url(url.to_string())).await?;
    worker.status = WorkerStatus::Working;
    worker.current_url = Some(url.to_string());
    meter.start(worker.id());
    Ok(())
}

/// Reads and applies one reply from a worker that has a request outstanding
async fn handle_reply(
    worker: &mut WorkerHandle,
    cycle: &mut CycleResult,
    meter: &mut ProgressMeter,
) -> Result<(), DispatchError> {
    let id = worker.id();
    match read_reply(worker).await? {
        Reply::Fetched { bytes } => {
            cycle.total_bytes += bytes;
            cycle.request_count += 1;
            worker.status = WorkerStatus::Ready;
            meter.finish(id);
        }
        Reply::Err { code } => {
            let url = worker.current_url().unwrap_or("<unknown>");
            tracing::error!("Error getting {}: {} (code {})", url, describe_code(code), code);
            if cycle.first_error.is_none() {
                cycle.first_error = Some(CycleError {
                    code,
                    url: worker.current_url.clone(),
                });
            }
            worker.status = WorkerStatus::Ready;
            meter.finish(id);
        }
        Reply::Report { delta } => {
            if let Some(report) = meter.record(id, delta) {
                println!("{}", report);
            }
        }
        reply => return Err(DispatchError::UnexpectedReply { id, reply }),
    }
    Ok(())
}

/// Blocks until at least one working worker has data to read
///
/// Returns the indices of every working worker whose channel is readable, in
/// pool order, or an empty list if no worker is working.
async fn wait_readable(
    workers: &mut [WorkerHandle],
    cancel: &CancellationToken,
) -> Result<Vec<usize>, DispatchError> {
    let waits: Vec<_> = workers
        .iter_mut()
        .enumerate()
        .filter(|(_, worker)| worker.status.is_working())
        .map(|(idx, worker)| Box::pin(async move { worker.reader.fill_buf().await.map(|_| idx) }))
        .collect();

    if waits.is_empty() {
        return Ok(Vec::new());
    }

    // fill_buf is cancel-safe: whatever the losing waits read stays buffered.
    let (first, _, rest) = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(DispatchError::Cancelled),
        done = future::select_all(waits) => done,
    };

    let mut ready = vec![first.map_err(crate::channel::ChannelError::from)?];
    for wait in rest {
        if let Some(result) = wait.now_or_never() {
            ready.push(result.map_err(crate::channel::ChannelError::from)?);
        }
    }
    ready.sort_unstable();
    Ok(ready)
}

/// Waits for a reply to a synchronous request, skipping progress reports
async fn expect_reply(
    worker: &mut WorkerHandle,
    cancel: &CancellationToken,
) -> Result<Reply, DispatchError> {
    loop {
        let reply = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DispatchError::Cancelled),
            reply = read_reply(worker) => reply?,
        };
        if !matches!(reply, Reply::Report { .. }) {
            return Ok(reply);
        }
    }
}

async fn read_reply(worker: &mut WorkerHandle) -> Result<Reply, DispatchError> {
    let payload = expect_frame(worker).await?;
    Reply::parse(&payload).map_err(|source| DispatchError::Protocol {
        id: worker.id(),
        source,
    })
}

async fn expect_frame(worker: &mut WorkerHandle) -> Result<Vec<u8>, DispatchError> {
    match worker.receive().await? {
        Received::Frame(payload) => Ok(payload),
        Received::Closed => Err(DispatchError::WorkerExited { id: worker.id() }),
        Received::Short(_) => Err(DispatchError::Truncated { id: worker.id() }),
    }
}
