//! # Signal Records
//!
//! Value types for a single observed uplink or downlink.

use std::fmt;

/// Direction of a signal relative to the ground station
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Ground station to spacecraft
    Uplink,
    /// Spacecraft to ground station
    Downlink,
}

impl Direction {
    /// Suffix used in log file names (`up` / `down`)
    pub fn file_suffix(self) -> &'static str {
        match self {
            Direction::Uplink => "up",
            Direction::Downlink => "down",
        }
    }

    /// Element name used for this direction in the DSN feed
    pub fn feed_marker(self) -> &'static str {
        match self {
            Direction::Uplink => "upSignal",
            Direction::Downlink => "downSignal",
        }
    }

    /// Inverse of [`Direction::feed_marker`]
    pub fn from_feed_marker(marker: &str) -> Option<Self> {
        match marker {
            "upSignal" => Some(Direction::Uplink),
            "downSignal" => Some(Direction::Downlink),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Uplink => write!(f, "UPLINK"),
            Direction::Downlink => write!(f, "DOWNLINK"),
        }
    }
}

/// One uplink or downlink observation
#[derive(Debug, Clone, PartialEq)]
pub struct SignalRecord {
    /// Feed timestamp in milliseconds since the Unix epoch
    pub timestamp: i64,

    /// Carrier frequency in Hz
    pub frequency: u64,

    /// Signal power in dBm (usually negative for downlinks)
    pub power: f64,

    /// Spacecraft short code (e.g. "MVN")
    pub spacecraft: String,

    /// Uplink or downlink
    pub direction: Direction,
}

impl SignalRecord {
    #[must_use]
    pub fn new(
        timestamp: i64,
        frequency: u64,
        power: f64,
        spacecraft: impl Into<String>,
        direction: Direction,
    ) -> Self {
        Self {
            timestamp,
            frequency,
            power,
            spacecraft: spacecraft.into(),
            direction,
        }
    }
}
