//! # Stations
//!
//! The three DSN complexes and the per-station signal buffer.
//!
//! Each complex differs only in its name and the set of dish antennas that
//! belong to it, so a single [`Station`] type is parameterised by a
//! [`StationConfig`] looked up from [`StationId`].

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::debug;

use super::logger::LogWriter;
use super::signal::{Direction, SignalRecord};
use crate::error::{DsnLoggerError, Result};

/// Canberra Deep Space Communication Complex dishes
pub const CANBERRA_DISH_IDS: &[u8] = &[34, 35, 36, 43];

/// Goldstone Deep Space Communications Complex dishes
pub const GOLDSTONE_DISH_IDS: &[u8] = &[14, 24, 25, 26];

/// Madrid Deep Space Communications Complex dishes
pub const MADRID_DISH_IDS: &[u8] = &[53, 54, 55, 56, 63, 65];

/// Identifies one of the monitored complexes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StationId {
    Canberra,
    Goldstone,
    Madrid,
}

impl StationId {
    /// All known stations, in lookup order
    pub const ALL: [StationId; 3] = [StationId::Canberra, StationId::Goldstone, StationId::Madrid];

    /// Static configuration for this station
    pub fn config(self) -> StationConfig {
        match self {
            StationId::Canberra => StationConfig {
                name: "Canberra",
                dish_ids: CANBERRA_DISH_IDS,
            },
            StationId::Goldstone => StationConfig {
                name: "Goldstone",
                dish_ids: GOLDSTONE_DISH_IDS,
            },
            StationId::Madrid => StationConfig {
                name: "Madrid",
                dish_ids: MADRID_DISH_IDS,
            },
        }
    }
}

impl FromStr for StationId {
    type Err = DsnLoggerError;

    fn from_str(s: &str) -> Result<Self> {
        StationId::ALL
            .into_iter()
            .find(|id| id.config().name.eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DsnLoggerError::UnknownStation(s.to_string()))
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config().name)
    }
}

/// Name and dish set of a complex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationConfig {
    /// Friendly name as it appears in the feed (e.g. "Canberra")
    pub name: &'static str,

    /// Two-digit dish identifiers owned by this complex
    pub dish_ids: &'static [u8],
}

impl StationConfig {
    /// Returns true if `dish_id` belongs to this complex
    pub fn owns_dish(&self, dish_id: u8) -> bool {
        self.dish_ids.contains(&dish_id)
    }
}

/// In-memory uplink and downlink buffers for one complex
///
/// Records are kept in arrival order. Identical consecutive records are
/// kept as-is: the buffer is a log of every poll, not a change log.
#[derive(Debug, Clone)]
pub struct Station {
    config: StationConfig,
    uplink: Vec<SignalRecord>,
    downlink: Vec<SignalRecord>,
}

impl Station {
    #[must_use]
    pub fn new(config: StationConfig) -> Self {
        Self {
            config,
            uplink: Vec::new(),
            downlink: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.config.name
    }

    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    pub fn valid_dish_ids(&self) -> &'static [u8] {
        self.config.dish_ids
    }

    pub fn uplink(&self) -> &[SignalRecord] {
        &self.uplink
    }

    pub fn downlink(&self) -> &[SignalRecord] {
        &self.downlink
    }

    /// Route a record to the buffer matching its direction
    pub fn append(&mut self, record: SignalRecord) {
        match record.direction {
            Direction::Uplink => self.uplink.push(record),
            Direction::Downlink => self.downlink.push(record),
        }
    }

    /// Append every record in order
    pub fn extend<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = SignalRecord>,
    {
        for record in records {
            self.append(record);
        }
    }

    /// Buffer size used to gate flushing.
    ///
    /// This is the downlink count only; downlink volume drives flush timing.
    pub fn size(&self) -> usize {
        self.downlink.len()
    }

    /// Number of records held across both directions
    pub fn total_len(&self) -> usize {
        self.uplink.len() + self.downlink.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uplink.is_empty() && self.downlink.is_empty()
    }

    /// Write both buffers through `writer` and empty them.
    ///
    /// Empty directions are skipped. Each buffer is cleared only after its
    /// own write succeeds, so a failed write leaves that direction buffered
    /// for the next flush.
    ///
    /// # Returns
    ///
    /// * `Result<Vec<PathBuf>>` - Files appended to, uplink first
    pub fn flush_and_clear(&mut self, writer: &LogWriter) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(2);

        for direction in [Direction::Uplink, Direction::Downlink] {
            let buffer = match direction {
                Direction::Uplink => &mut self.uplink,
                Direction::Downlink => &mut self.downlink,
            };

            if let Some(path) = writer.write(self.config.name, direction, buffer.as_slice())? {
                written.push(path);
            } else {
                debug!("{} {} buffer empty, nothing to flush", self.config.name, direction);
            }
            buffer.clear();
        }

        Ok(written)
    }
}
