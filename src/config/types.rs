use crate::fetcher::{AddressFamily, FetchOptions};
use crate::getter::UrlSource;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for http-getter
///
/// Every section and key is optional; missing values take the defaults the
/// command line also uses.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub run: RunConfig,
    pub fetch: FetchConfig,
    pub urls: UrlsConfig,
    pub output: OutputConfig,
}

/// Cycle scheduling configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct RunConfig {
    /// Number of concurrent workers
    pub workers: usize,

    /// Time between cycle starts (milliseconds)
    pub interval: u64,

    /// Total run length (seconds); 0 runs until interrupted
    pub run_length: u64,

    /// Maximum number of cycles; 0 is unlimited
    pub count: u64,

    /// End the run after the first failed cycle
    pub stop_on_error: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            interval: 200,
            run_length: 60,
            count: 0,
            stop_on_error: false,
        }
    }
}

/// Transport settings applied to every worker's fetcher
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct FetchConfig {
    /// Per-fetch timeout (milliseconds); 0 disables it
    pub timeout: u64,

    /// `host=ip[,host=ip...]` pins applied before DNS
    pub dns_override: Option<String>,

    pub address_family: AddressFamily,

    /// Interval between progress lines (milliseconds); 0 disables them
    pub progress_interval: u64,
}

/// Where the URLs come from: exactly one of the two must be set
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UrlsConfig {
    /// Static list fetched every cycle
    pub list: Option<Vec<String>>,

    /// Remote URL list fetched at the start of every cycle
    pub location: Option<String>,
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// File receiving report lines; `-` is standard output
    pub path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: "-".to_string(),
        }
    }
}

fn millis(value: u64) -> Option<Duration> {
    (value > 0).then(|| Duration::from_millis(value))
}

impl Config {
    /// Fetcher options derived from the `[fetch]` section
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            timeout: millis(self.fetch.timeout),
            dns_override: self
                .fetch
                .dns_override
                .clone()
                .filter(|pins| !pins.trim().is_empty()),
            family: self.fetch.address_family,
            progress_interval: millis(self.fetch.progress_interval),
        }
    }

    /// The cycle's URL source; a remote location wins over a static list
    pub fn url_source(&self) -> UrlSource {
        match (&self.urls.location, &self.urls.list) {
            (Some(location), _) => UrlSource::Remote(location.clone()),
            (None, Some(list)) => UrlSource::Static(list.clone()),
            (None, None) => UrlSource::Static(Vec::new()),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.run.interval)
    }

    /// `None` when the run is unbounded in time
    pub fn run_length(&self) -> Option<Duration> {
        (self.run.run_length > 0).then(|| Duration::from_secs(self.run.run_length))
    }

    /// `None` when the number of cycles is unbounded
    pub fn cycle_limit(&self) -> Option<u64> {
        (self.run.count > 0).then_some(self.run.count)
    }

    /// `None` when report lines go to standard output
    pub fn output_path(&self) -> Option<&str> {
        match self.output.path.as_str() {
            "" | "-" => None,
            path => Some(path),
        }
    }
}
