//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and key is optional; missing values fall back to the
//! defaults below.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{DsnLoggerError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Feed retrieval configuration
#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    #[serde(default = "default_feed_url")]
    pub url: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Poll loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    #[serde(default = "default_interval_s")]
    pub interval_s: u64,

    #[serde(default = "default_threshold")]
    pub threshold: usize,
}

/// Signal log output configuration
#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

// Default value functions
fn default_feed_url() -> String { "https://eyes.nasa.gov/dsn/data/dsn.xml".to_string() }
fn default_timeout_ms() -> u64 { 5000 }

fn default_interval_s() -> u64 { 10 }
fn default_threshold() -> usize { 1000 }

fn default_log_dir() -> String { ".".to_string() }

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_s: default_interval_s(),
            threshold: default_threshold(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
        }
    }
}

impl FeedConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_s)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use dsn_logger::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.feed.url.trim().is_empty() {
            return Err(invalid("feed url cannot be empty"));
        }

        if !self.feed.url.starts_with("http://") && !self.feed.url.starts_with("https://") {
            return Err(invalid("feed url must start with http:// or https://"));
        }

        if self.feed.timeout_ms == 0 || self.feed.timeout_ms > 60000 {
            return Err(invalid("timeout_ms must be between 1 and 60000"));
        }

        if self.scheduler.interval_s == 0 || self.scheduler.interval_s > 3600 {
            return Err(invalid("interval_s must be between 1 and 3600"));
        }

        if self.scheduler.threshold == 0 {
            return Err(invalid("threshold must be greater than 0"));
        }

        if self.output.log_dir.is_empty() {
            return Err(invalid("log_dir cannot be empty"));
        }

        Ok(())
    }
}

fn invalid(msg: &str) -> DsnLoggerError {
    DsnLoggerError::Config(toml::de::Error::custom(msg))
}
