//! # Telemetry Module
//!
//! Turns DSN feed snapshots into signal logs.
//!
//! This module handles:
//! - Parsing signal records out of the raw feed text
//! - Buffering records per station and direction
//! - Writing buffered records to time-windowed CSV files

pub mod logger;
pub mod parser;
pub mod signal;
pub mod station;
