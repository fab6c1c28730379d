//! # DSN Logger
//!
//! Poll the Deep Space Network activity feed and log uplink/downlink signals.
//!
//! This application watches one DSN complex, buffers the signals its dishes
//! report and writes them to rotating CSV files.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use dsn_logger::config::Config;
use dsn_logger::feed::HttpFeedFetcher;
use dsn_logger::scheduler::Scheduler;
use dsn_logger::telemetry::logger::LogWriter;
use dsn_logger::telemetry::station::{Station, StationId};

/// Extra time granted to a fetch on top of the HTTP client's own timeout
const FETCH_TIMEOUT_MARGIN_MS: u64 = 1000;

/// Command line interface
#[derive(Debug, Parser)]
#[command(name = "dsn-logger", version, about = "Log DSN uplink/downlink activity to CSV")]
struct Cli {
    /// Station to monitor: canberra, goldstone or madrid
    station: StationId,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Poll interval in seconds (overrides the config file)
    #[arg(long, value_name = "SECONDS")]
    interval: Option<u64>,

    /// Downlink records buffered before a flush (overrides the config file)
    #[arg(long, value_name = "RECORDS")]
    threshold: Option<usize>,

    /// Directory for signal logs (overrides the config file)
    #[arg(long, value_name = "DIR")]
    log_dir: Option<String>,
}

impl Cli {
    /// Load the config file (or defaults) and apply command line overrides
    fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(interval) = self.interval {
            config.scheduler.interval_s = interval;
        }
        if let Some(threshold) = self.threshold {
            config.scheduler.threshold = threshold;
        }
        if let Some(log_dir) = &self.log_dir {
            config.output.log_dir = log_dir.clone();
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

/// Main entry point for DSN Logger
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Set up logging with tracing subscriber
///    - Parse the station selection and load configuration
///
/// 2. **Main Loop**
///    - Every interval, fetch and buffer signals or flush buffers to CSV
///    - Failed ticks are logged and retried on the next interval
///
/// 3. **Graceful Shutdown**
///    - Ctrl+C stops the loop
///    - Remaining buffered records are flushed
///
/// # Errors
///
/// Returns error if the station argument or configuration is invalid
///
/// # Examples
///
/// ```bash
/// cargo run --release -- canberra --log-dir ./logs
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
        )
        .init();

    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    info!("DSN Logger v{} starting...", env!("CARGO_PKG_VERSION"));

    let station = Station::new(cli.station.config());
    info!(
        "Monitoring {} (dishes {:?})",
        station.name(),
        station.valid_dish_ids()
    );

    let fetcher = HttpFeedFetcher::from_config(&config.feed);
    info!("Feed: {}", fetcher.url());

    let writer = LogWriter::new(&config.output.log_dir);
    info!("Writing signal logs to {}", writer.dir().display());

    let fetch_timeout = config.feed.timeout() + std::time::Duration::from_millis(FETCH_TIMEOUT_MARGIN_MS);
    let mut scheduler = Scheduler::new(station, fetcher, writer, &config.scheduler)
        .with_fetch_timeout(fetch_timeout);

    info!("Press Ctrl+C to exit");
    scheduler.run().await;

    Ok(())
}
