//! Text commands and replies carried inside frames
//!
//! Coordinator → worker: `RESET`, `STOP`, `URL <target>`, `URLLIST <location>`.
//!
//! Worker → coordinator: `OK`, `OK <n> bytes`, `OK <n> bytes <m> urls`,
//! `ERR <code>`, `REP <delta>`. A `URLLIST` success is followed by `m` raw
//! frames, one URL each, which are not parsed as replies.

use std::fmt;
use thiserror::Error;

/// A payload that could not be understood
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("payload is not valid UTF-8")]
    NotUtf8,

    #[error("unrecognised command '{0}'")]
    UnknownCommand(String),

    #[error("malformed reply '{0}'")]
    MalformedReply(String),
}

/// Commands sent from the coordinator to a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Reset,
    Stop,
    Url(String),
    UrlList(String),
}

/// Replies sent from a worker to the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Plain acknowledgement of `RESET`
    Ok,

    /// A fetch finished; byte count includes headers
    Fetched { bytes: u64 },

    /// A URL list was fetched; `urls` raw frames follow
    Listed { bytes: u64, urls: usize },

    /// The request failed with the fetcher's native code
    Err { code: i32 },

    /// Mid-fetch progress: bytes received since the previous report
    Report { delta: u64 },
}

/// Decodes a payload to text, dropping a trailing NUL sentinel if present
pub fn payload_text(payload: &[u8]) -> Result<&str, ProtocolError> {
    let payload = payload.strip_suffix(&[0u8]).unwrap_or(payload);
    std::str::from_utf8(payload).map_err(|_| ProtocolError::NotUtf8)
}

impl Command {
    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        let text = payload_text(payload)?;
        if let Some(location) = text.strip_prefix("URLLIST ") {
            return Ok(Self::UrlList(location.to_string()));
        }
        if let Some(target) = text.strip_prefix("URL ") {
            return Ok(Self::Url(target.to_string()));
        }
        match text {
            "RESET" => Ok(Self::Reset),
            "STOP" => Ok(Self::Stop),
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }

    pub fn to_payload(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reset => f.write_str("RESET"),
            Self::Stop => f.write_str("STOP"),
            Self::Url(target) => write!(f, "URL {}", target),
            Self::UrlList(location) => write!(f, "URLLIST {}", location),
        }
    }
}

impl Reply {
    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        let text = payload_text(payload)?;
        let malformed = || ProtocolError::MalformedReply(text.to_string());
        let tokens: Vec<&str> = text.split_ascii_whitespace().collect();

        match tokens.as_slice() {
            ["OK"] => Ok(Self::Ok),
            ["OK", bytes, "bytes"] => Ok(Self::Fetched {
                bytes: bytes.parse().map_err(|_| malformed())?,
            }),
            ["OK", bytes, "bytes", urls, "urls"] => Ok(Self::Listed {
                bytes: bytes.parse().map_err(|_| malformed())?,
                urls: urls.parse().map_err(|_| malformed())?,
            }),
            ["ERR", code] => Ok(Self::Err {
                code: code.parse().map_err(|_| malformed())?,
            }),
            ["REP", delta] => Ok(Self::Report {
                delta: delta.parse().map_err(|_| malformed())?,
            }),
            _ => Err(malformed()),
        }
    }

    pub fn to_payload(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("OK"),
            Self::Fetched { bytes } => write!(f, "OK {} bytes", bytes),
            Self::Listed { bytes, urls } => write!(f, "OK {} bytes {} urls", bytes, urls),
            Self::Err { code } => write!(f, "ERR {}", code),
            Self::Report { delta } => write!(f, "REP {}", delta),
        }
    }
}
