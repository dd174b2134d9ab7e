//! reqwest-backed fetcher
//!
//! Follows redirects, counts header bytes alongside body bytes, and streams the
//! body chunk by chunk so progress can be reported while a transfer runs.

use super::{codes, AddressFamily, FetchError, FetchOptions, Fetcher, ProgressSender};
use reqwest::{redirect::Policy, Client, Response};
use std::error::Error as _;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

const USER_AGENT: &str = concat!("http-getter/", env!("CARGO_PKG_VERSION"));
const MAX_REDIRECTS: usize = 10;

/// Fetcher built on a `reqwest::Client`
///
/// The client is created by [`Fetcher::configure`]; fetching before that
/// fails with [`codes::FAILED_INIT`].
#[derive(Debug, Default)]
pub struct HttpFetcher {
    client: Option<Client>,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self) -> Result<&Client, FetchError> {
        self.client
            .as_ref()
            .ok_or_else(|| FetchError::new(codes::FAILED_INIT, "fetcher is not configured"))
    }
}

impl Fetcher for HttpFetcher {
    fn configure(&mut self, options: &FetchOptions) -> Result<(), FetchError> {
        self.client = None;
        self.client = Some(build_client(options)?);
        Ok(())
    }

    async fn fetch(&mut self, url: &str, progress: Option<ProgressSender>) -> Result<u64, FetchError> {
        let mut response = self.client()?.get(url).send().await.map_err(classify)?;
        let header_bytes = header_size(&response);

        let mut body_bytes = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(classify)? {
            body_bytes += chunk.len() as u64;
            if let Some(progress) = &progress {
                // The receiver only disappears once the worker stops caring.
                let _ = progress.send(body_bytes);
            }
        }

        tracing::trace!("{} -> {} header + {} body bytes", url, header_bytes, body_bytes);
        Ok(header_bytes + body_bytes)
    }

    async fn fetch_text(&mut self, url: &str) -> Result<(u64, String), FetchError> {
        let response = self.client()?.get(url).send().await.map_err(classify)?;
        let header_bytes = header_size(&response);
        let body = response.bytes().await.map_err(classify)?;
        let text = String::from_utf8_lossy(&body).into_owned();
        Ok((header_bytes + body.len() as u64, text))
    }
}

/// Builds an HTTP client from the fetch options
fn build_client(options: &FetchOptions) -> Result<Client, FetchError> {
    let mut builder = Client::builder()
        .user_agent(USER_AGENT)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .tcp_nodelay(true);

    if let Some(timeout) = options.timeout {
        builder = builder.timeout(timeout);
    }

    builder = match options.family {
        AddressFamily::Any => builder,
        AddressFamily::Ipv4 => builder.local_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
        AddressFamily::Ipv6 => builder.local_address(IpAddr::V6(Ipv6Addr::UNSPECIFIED)),
    };

    if let Some(spec) = &options.dns_override {
        let pins = parse_dns_override(spec)
            .map_err(|e| FetchError::new(codes::FAILED_INIT, format!("DNS override: {}", e)))?;
        for (host, ip) in pins {
            // reqwest ignores the port of an override and uses the URL's.
            builder = builder.resolve(&host, SocketAddr::new(ip, 0));
        }
    }

    builder
        .build()
        .map_err(|e| FetchError::new(codes::FAILED_INIT, e.to_string()))
}

/// Parses `host=ip[,host=ip...]` DNS pins
pub fn parse_dns_override(spec: &str) -> Result<Vec<(String, IpAddr)>, String> {
    spec.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (host, ip) = entry
                .split_once('=')
                .ok_or_else(|| format!("expected host=ip, got '{}'", entry))?;
            let host = host.trim();
            if host.is_empty() {
                return Err(format!("missing host in '{}'", entry));
            }
            let ip = ip
                .trim()
                .parse::<IpAddr>()
                .map_err(|e| format!("invalid address in '{}': {}", entry, e))?;
            Ok((host.to_string(), ip))
        })
        .collect()
}

/// Approximates the size of the response head as it appeared on the wire
fn header_size(response: &Response) -> u64 {
    let status_line = format!("{:?} {}\r\n", response.version(), response.status()).len();
    let headers: usize = response
        .headers()
        .iter()
        .map(|(name, value)| name.as_str().len() + 2 + value.as_bytes().len() + 2)
        .sum();
    (status_line + headers + 2) as u64
}

/// Maps a reqwest error onto a native error code
fn classify(e: reqwest::Error) -> FetchError {
    let code = if e.is_timeout() {
        codes::OPERATION_TIMEDOUT
    } else if e.is_redirect() {
        codes::TOO_MANY_REDIRECTS
    } else if e.is_builder() {
        codes::URL_MALFORMAT
    } else if e.is_connect() {
        if source_chain_mentions(&e, "dns error") {
            codes::COULDNT_RESOLVE_HOST
        } else {
            codes::COULDNT_CONNECT
        }
    } else if e.is_decode() {
        codes::BAD_CONTENT_ENCODING
    } else if e.is_body() || e.is_request() {
        codes::RECV_ERROR
    } else {
        codes::UNKNOWN
    };

    FetchError::new(code, e.to_string())
}

fn source_chain_mentions(e: &reqwest::Error, needle: &str) -> bool {
    let mut source = e.source();
    while let Some(inner) = source {
        if inner.to_string().contains(needle) {
            return true;
        }
        source = inner.source();
    }
    false
}

/// Human-readable description of a native error code
pub fn describe_code(code: i32) -> &'static str {
    match code {
        codes::UNKNOWN => "Unknown error",
        codes::FAILED_INIT => "Failed initialization",
        codes::URL_MALFORMAT => "URL using bad/illegal format or missing URL",
        codes::COULDNT_RESOLVE_HOST => "Couldn't resolve host name",
        codes::COULDNT_CONNECT => "Couldn't connect to server",
        codes::OPERATION_TIMEDOUT => "Timeout was reached",
        codes::TOO_MANY_REDIRECTS => "Number of redirects hit maximum amount",
        codes::RECV_ERROR => "Failure when receiving data from the peer",
        codes::BAD_CONTENT_ENCODING => "Unrecognized or bad HTTP Content or Transfer-Encoding",
        _ => "Unknown error code",
    }
}
