//! http-getter main entry point
//!
//! This is the command-line interface for the http-getter load generator.

use clap::Parser;
use http_getter::config::{load_url_file, read_config_with_hash, validate, Config};
use http_getter::fetcher::AddressFamily;
use http_getter::{run_loop, ConfigError, HttpFetcher};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// http-getter: a periodic HTTP load generator
///
/// A pool of workers fetches every URL once per cycle. Cycles start at a
/// fixed interval; a line is written for each cycle that received data and
/// a summary line when the run ends.
#[derive(Parser, Debug)]
#[command(name = "http-getter")]
#[command(version)]
#[command(about = "A periodic HTTP load generator", long_about = None)]
struct Cli {
    /// File of URLs, one per line; `-` reads standard input
    #[arg(value_name = "URL_FILE", conflicts_with = "url_list")]
    url_file: Option<PathBuf>,

    /// Connect over IPv4 only (default)
    #[arg(short = '4', conflicts_with = "ipv6")]
    ipv4: bool,

    /// Connect over IPv6 only
    #[arg(short = '6')]
    ipv6: bool,

    /// Stop after this many cycles (0 = unlimited)
    #[arg(short = 'c', long)]
    count: Option<u64>,

    /// Path to TOML configuration file
    #[arg(short = 'C', long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Static DNS pins, `host=ip[,host=ip...]`
    #[arg(short = 'd', long = "dns", value_name = "PINS")]
    dns_override: Option<String>,

    /// Time between cycle starts, in milliseconds
    #[arg(short = 'i', long, value_name = "MS")]
    interval: Option<u64>,

    /// Total run length in seconds (0 = until interrupted)
    #[arg(short = 'l', long = "length", value_name = "SECONDS")]
    run_length: Option<u64>,

    /// Number of concurrent workers
    #[arg(short = 'n', long)]
    workers: Option<usize>,

    /// Write report lines to this file instead of standard output
    #[arg(short = 'o', long, value_name = "PATH")]
    output: Option<String>,

    /// Print per-worker throughput at this interval, in milliseconds (0 = off)
    #[arg(short = 'p', long = "progress", value_name = "MS")]
    progress_interval: Option<u64>,

    /// Per-fetch timeout in milliseconds (0 = none)
    #[arg(short = 't', long, value_name = "MS")]
    timeout: Option<u64>,

    /// Fetch the URL list from this location at the start of every cycle
    #[arg(short = 'u', long = "url-list", value_name = "URL")]
    url_list: Option<String>,

    /// End the run after the first failed cycle
    #[arg(long)]
    stop_on_error: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let output = match open_output(&config) {
        Ok(output) => output,
        Err(e) => {
            tracing::error!("Failed to open output '{}': {}", config.output.path, e);
            return ExitCode::FAILURE;
        }
    };

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    match run_loop(&config, |_| HttpFetcher::new(), output, &cancel).await {
        Ok(report) => {
            tracing::info!(
                "Run finished after {} cycles{}",
                report.stats.total_count,
                if report.cancelled { " (interrupted)" } else { "" }
            );
            ExitCode::from(report.exit_code())
        }
        Err(e) => {
            tracing::error!("Run failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Logs go to stderr; stdout carries only report lines.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("http_getter=info,warn"),
            1 => EnvFilter::new("http_getter=debug,info"),
            2 => EnvFilter::new("http_getter=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the optional config file, applies command-line overrides, validates
fn build_config(cli: &Cli) -> Result<Config, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = read_config_with_hash(path)?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    if let Some(workers) = cli.workers {
        config.run.workers = workers;
    }
    if let Some(interval) = cli.interval {
        config.run.interval = interval;
    }
    if let Some(run_length) = cli.run_length {
        config.run.run_length = run_length;
    }
    if let Some(count) = cli.count {
        config.run.count = count;
    }
    if cli.stop_on_error {
        config.run.stop_on_error = true;
    }

    if let Some(timeout) = cli.timeout {
        config.fetch.timeout = timeout;
    }
    if let Some(pins) = &cli.dns_override {
        config.fetch.dns_override = Some(pins.clone());
    }
    if cli.ipv4 {
        config.fetch.address_family = AddressFamily::Ipv4;
    } else if cli.ipv6 {
        config.fetch.address_family = AddressFamily::Ipv6;
    }
    if let Some(progress) = cli.progress_interval {
        config.fetch.progress_interval = progress;
    }

    if let Some(location) = &cli.url_list {
        config.urls.location = Some(location.clone());
        config.urls.list = None;
    } else if let Some(path) = &cli.url_file {
        let urls = load_url_file(path)?;
        tracing::info!("Read {} URLs from {}", urls.len(), path.display());
        config.urls.list = Some(urls);
        config.urls.location = None;
    }

    if let Some(output) = &cli.output {
        config.output.path = output.clone();
    }

    validate(&config)?;
    Ok(config)
}

fn open_output(config: &Config) -> io::Result<Box<dyn Write>> {
    Ok(match config.output_path() {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout()),
    })
}

/// Cancels `cancel` on Ctrl+C or SIGTERM
async fn shutdown_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }

    cancel.cancel();
}
