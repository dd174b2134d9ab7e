//! Fetcher capability used by workers
//!
//! A worker owns exactly one [`Fetcher`] and drives it one request at a time.
//! The fetcher knows nothing about frames or the pool; it only reports byte
//! counts, native error codes and, optionally, cumulative progress.

mod http;
mod url_list;

pub use http::{describe_code, parse_dns_override, HttpFetcher};
pub use url_list::{parse_url_list, url_lines, MAX_URLS, MAX_URL_LEN};

use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Native error codes, numbered like libcurl's so log consumers keep working
pub mod codes {
    pub const FAILED_INIT: i32 = 2;
    pub const URL_MALFORMAT: i32 = 3;
    pub const COULDNT_RESOLVE_HOST: i32 = 6;
    pub const COULDNT_CONNECT: i32 = 7;
    pub const OPERATION_TIMEDOUT: i32 = 28;
    pub const TOO_MANY_REDIRECTS: i32 = 47;
    pub const BAD_CONTENT_ENCODING: i32 = 61;
    pub const RECV_ERROR: i32 = 56;
    pub const UNKNOWN: i32 = 1;
}

/// Receives cumulative body-byte snapshots while a fetch is in flight
pub type ProgressSender = mpsc::UnboundedSender<u64>;

/// A failed fetch or configuration attempt
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message} (code {code})")]
pub struct FetchError {
    /// Native error code, propagated to the coordinator uninterpreted
    pub code: i32,
    pub message: String,
}

impl FetchError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Address family preference for outgoing connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    /// Let the resolver decide
    Any,
    #[default]
    Ipv4,
    Ipv6,
}

/// Configuration-derived fetcher state, reapplied on every `RESET`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Per-fetch timeout; `None` waits indefinitely
    pub timeout: Option<Duration>,

    /// Static `host=ip` pins applied before DNS
    pub dns_override: Option<String>,

    pub family: AddressFamily,

    /// Interval between progress lines; `None` disables `REP` frames
    pub progress_interval: Option<Duration>,
}

impl FetchOptions {
    pub fn progress_enabled(&self) -> bool {
        self.progress_interval.is_some()
    }
}

/// Performs HTTP fetches on behalf of one worker
pub trait Fetcher: Send + 'static {
    /// Discards transport state and rebuilds it from `options`
    fn configure(&mut self, options: &FetchOptions) -> Result<(), FetchError>;

    /// Fetches `url` and returns the byte count including headers
    fn fetch(
        &mut self,
        url: &str,
        progress: Option<ProgressSender>,
    ) -> impl Future<Output = Result<u64, FetchError>> + Send;

    /// Fetches `url` and returns the byte count together with the body text
    fn fetch_text(
        &mut self,
        url: &str,
    ) -> impl Future<Output = Result<(u64, String), FetchError>> + Send;
}
