//! Worker command loop
//!
//! A worker reads one command frame at a time, performs it with its fetcher,
//! and answers on the same channel. It never holds more than one command.

use super::WorkerError;
use crate::channel::{self, ChannelError, Command, Received, Reply, MAX_FRAME_LEN};
use crate::fetcher::{parse_url_list, FetchError, FetchOptions, Fetcher};
use crate::state::WorkerState;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

/// One worker: a fetcher plus the worker's ends of its message channel
pub struct WorkerRunner<F, R, W> {
    id: usize,
    fetcher: F,
    options: Arc<FetchOptions>,
    reader: R,
    writer: W,
    state: WorkerState,
}

impl<F, R, W> WorkerRunner<F, R, W>
where
    F: Fetcher,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a runner; the fetcher is expected to be configured already
    pub fn new(id: usize, fetcher: F, options: Arc<FetchOptions>, reader: R, writer: W) -> Self {
        Self {
            id,
            fetcher,
            options,
            reader,
            writer,
            state: WorkerState::Starting,
        }
    }

    /// Runs until `STOP`, a closed channel, or an unrecognised command
    ///
    /// The fetcher is dropped when this returns.
    pub async fn run(mut self) -> Result<(), WorkerError> {
        self.transition(WorkerState::Ready);
        let result = self.command_loop().await;
        self.transition(WorkerState::Stopped);
        result
    }

    async fn command_loop(&mut self) -> Result<(), WorkerError> {
        loop {
            let payload = match channel::receive(&mut self.reader, MAX_FRAME_LEN).await? {
                Received::Frame(payload) => payload,
                Received::Closed | Received::Short(_) => {
                    tracing::debug!("Worker {}: channel closed", self.id);
                    return Ok(());
                }
            };

            let command = match Command::parse(&payload) {
                Ok(command) => command,
                Err(e) => {
                    tracing::error!("Worker {}: {}", self.id, e);
                    return Err(e.into());
                }
            };

            match command {
                Command::Stop => return Ok(()),
                Command::Reset => self.reset().await?,
                Command::Url(target) => self.get(&target).await?,
                Command::UrlList(location) => self.get_list(&location).await?,
            }
        }
    }

    async fn reset(&mut self) -> Result<(), ChannelError> {
        let reply = match self.fetcher.configure(&self.options) {
            Ok(()) => Reply::Ok,
            Err(e) => {
                tracing::warn!("Worker {}: reset failed: {}", self.id, e);
                Reply::Err { code: e.code }
            }
        };
        self.reply(reply).await
    }

    async fn get(&mut self, target: &str) -> Result<(), ChannelError> {
        tracing::debug!("Worker {}: getting URL '{}'", self.id, target);
        self.transition(WorkerState::Working);

        let result = fetch_with_progress(
            &mut self.fetcher,
            &mut self.writer,
            target,
            self.options.progress_enabled(),
        )
        .await?;

        let reply = match result {
            Ok(bytes) => Reply::Fetched { bytes },
            Err(e) => Reply::Err { code: e.code },
        };
        self.reply(reply).await?;
        self.transition(WorkerState::Ready);
        Ok(())
    }

    async fn get_list(&mut self, location: &str) -> Result<(), ChannelError> {
        tracing::debug!("Worker {}: getting URL list '{}'", self.id, location);
        self.transition(WorkerState::Working);

        match self.fetcher.fetch_text(location).await {
            Ok((bytes, body)) => {
                let urls = parse_url_list(&body);
                self.reply(Reply::Listed {
                    bytes,
                    urls: urls.len(),
                })
                .await?;
                for url in &urls {
                    channel::send(&mut self.writer, url.as_bytes()).await?;
                }
            }
            Err(e) => self.reply(Reply::Err { code: e.code }).await?,
        }

        self.transition(WorkerState::Ready);
        Ok(())
    }

    async fn reply(&mut self, reply: Reply) -> Result<(), ChannelError> {
        channel::send(&mut self.writer, &reply.to_payload()).await
    }

    fn transition(&mut self, to: WorkerState) {
        debug_assert!(
            self.state.can_transition_to(to),
            "worker {}: {} -> {}",
            self.id,
            self.state,
            to
        );
        if to.is_terminal() {
            tracing::debug!("Worker {}: stopped after {}", self.id, self.state);
        } else {
            tracing::trace!("Worker {}: {} -> {}", self.id, self.state, to);
        }
        self.state = to;
    }
}

/// Runs one fetch, forwarding progress as `REP` frames ahead of the result
///
/// The outer error is a channel failure; the inner one is the fetch's own.
async fn fetch_with_progress<F, W>(
    fetcher: &mut F,
    writer: &mut W,
    url: &str,
    report: bool,
) -> Result<Result<u64, FetchError>, ChannelError>
where
    F: Fetcher,
    W: AsyncWrite + Unpin,
{
    if !report {
        return Ok(fetcher.fetch(url, None).await);
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut last = 0u64;

    let result = {
        let fetch = fetcher.fetch(url, Some(tx));
        tokio::pin!(fetch);
        loop {
            tokio::select! {
                biased;
                Some(total) = rx.recv() => send_report(writer, &mut last, total).await?,
                result = &mut fetch => break result,
            }
        }
    };

    // Snapshots queued after the last poll still precede the final reply.
    while let Ok(total) = rx.try_recv() {
        send_report(writer, &mut last, total).await?;
    }

    Ok(result)
}

async fn send_report<W>(writer: &mut W, last: &mut u64, total: u64) -> Result<(), ChannelError>
where
    W: AsyncWrite + Unpin,
{
    let delta = total.saturating_sub(*last);
    *last = total;
    if delta == 0 {
        return Ok(());
    }
    channel::send(writer, &Reply::Report { delta }.to_payload()).await
}
