//! # DSN Logger Library
//!
//! Poll the Deep Space Network activity feed and log uplink/downlink signals.
//!
//! This library provides the parsing, buffering and log rotation behind the
//! `dsn-logger` binary: one station is polled on a fixed interval, its
//! signals are buffered in memory and periodically flushed to CSV files
//! named after the time window they cover.

pub mod config;
pub mod error;
pub mod feed;
pub mod scheduler;
pub mod telemetry;
