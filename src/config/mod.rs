//! Configuration module for http-getter
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files. Command-line flags are merged over a file in `main`, so the file
//! may be partial; validation runs on the merged result.
//!
//! # Example
//!
//! ```no_run
//! use http_getter::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("getter.toml")).unwrap();
//! println!("Cycle interval: {:?}", config.interval());
//! ```

mod parser;
mod types;
mod validation;

pub use types::{Config, FetchConfig, OutputConfig, RunConfig, UrlsConfig};

pub use parser::{compute_config_hash, load_config, load_url_file, read_config, read_config_with_hash};
pub use validation::{validate, MAX_WORKERS};
