//! http-getter: a periodic HTTP load generator
//!
//! A fixed pool of workers fetches a set of URLs once per cycle, cycles start
//! on a drift-aware schedule, and the coordinator reports bytes received,
//! request counts and timing for every cycle and for the whole run.

pub mod channel;
pub mod config;
pub mod fetcher;
pub mod getter;
pub mod output;
pub mod state;
pub mod worker;

use thiserror::Error;

/// Main error type for http-getter operations
#[derive(Debug, Error)]
pub enum GetterError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Worker pool error: {0}")]
    Pool(#[from] worker::PoolError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] getter::DispatchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for http-getter operations
pub type Result<T> = std::result::Result<T, GetterError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use fetcher::{FetchError, FetchOptions, Fetcher, HttpFetcher};
pub use getter::{dispatch_cycle, run_loop, CycleResult, RunReport, UrlSource};
pub use state::{WorkerState, WorkerStatus};
pub use worker::WorkerPool;
