//! # Error Types
//!
//! Custom error types for DSN Logger using `thiserror`.

use thiserror::Error;

/// Reasons a feed blob is rejected as a whole
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// No `timeUTC` attribute found for the requested station
    #[error("no timeUTC found for station {station}")]
    MissingTimestamp { station: String },

    /// Signal fields inside one dish block do not line up
    #[error("field misalignment in dish {dish}: {detail}")]
    FieldMisalignment { dish: String, detail: String },
}

/// Main error type for DSN Logger
#[derive(Debug, Error)]
pub enum DsnLoggerError {
    /// Feed retrieval errors (transport, status, timeout)
    #[error("Feed fetch error: {0}")]
    Fetch(String),

    /// Feed content errors
    #[error("Feed parse error: {0}")]
    Parse(#[from] ParseError),

    /// Station selection errors
    #[error("Unknown station '{0}' (expected one of: canberra, goldstone, madrid)")]
    UnknownStation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Signal log (CSV) errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type alias for DSN Logger
pub type Result<T> = std::result::Result<T, DsnLoggerError>;
