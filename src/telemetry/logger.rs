//! # Signal Log Writer
//!
//! Appends buffered signal records to CSV files named after the station,
//! the time window they cover and their direction:
//!
//! ```text
//! {station}_{first_timestamp}_{last_timestamp}_{up|down}.csv
//! ```
//!
//! Files have no header row. Columns are `timestamp,frequency,power,spacecraft`
//! with power in fixed-point dBm. Each flush names its own window, so
//! rotation falls out of the naming scheme.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::info;

use super::signal::{Direction, SignalRecord};
use crate::error::Result;

/// Fractional digits written for the power column
pub const POWER_PRECISION: usize = 6;

/// Writes signal logs under a fixed directory
#[derive(Debug, Clone)]
pub struct LogWriter {
    dir: PathBuf,
}

impl LogWriter {
    /// Create a writer rooted at `dir` (created on first write)
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for a batch covering `start..=end`
    pub fn file_name(station_name: &str, direction: Direction, start: i64, end: i64) -> String {
        format!("{}_{}_{}_{}.csv", station_name, start, end, direction.file_suffix())
    }

    /// Append `records` to the log for this batch's window
    ///
    /// # Arguments
    ///
    /// * `station_name` - Station name used as the file prefix
    /// * `direction` - Direction of every record in the batch
    /// * `records` - Records in arrival order
    ///
    /// # Returns
    ///
    /// * `Result<Option<PathBuf>>` - Path appended to, or `None` if `records` is empty
    ///
    /// # Errors
    ///
    /// Returns error if the directory or file cannot be created or written
    pub fn write(
        &self,
        station_name: &str,
        direction: Direction,
        records: &[SignalRecord],
    ) -> Result<Option<PathBuf>> {
        let (Some(first), Some(last)) = (records.first(), records.last()) else {
            return Ok(None);
        };

        fs::create_dir_all(&self.dir)?;
        let path = self
            .dir
            .join(Self::file_name(station_name, direction, first.timestamp, last.timestamp));

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(file);

        for record in records {
            writer.write_record(&[
                record.timestamp.to_string(),
                record.frequency.to_string(),
                format!("{:.*}", POWER_PRECISION, record.power),
                record.spacecraft.clone(),
            ])?;
        }
        writer.flush()?;

        info!(
            "Flushed {} {} records for {} ({} .. {}) to {}",
            records.len(),
            direction,
            station_name,
            format_utc(first.timestamp),
            format_utc(last.timestamp),
            path.display()
        );

        Ok(Some(path))
    }
}

/// Read a signal log back into records
///
/// The direction is not stored in the file, so the caller supplies it
/// (it is encoded in the file name suffix).
///
/// # Errors
///
/// Returns error if the file cannot be opened or a row is malformed
pub fn read_log<P: AsRef<Path>>(path: P, direction: Direction) -> Result<Vec<SignalRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)?;

    let mut records = Vec::new();
    for row in reader.deserialize::<(i64, u64, f64, String)>() {
        let (timestamp, frequency, power, spacecraft) = row?;
        records.push(SignalRecord::new(timestamp, frequency, power, spacecraft, direction));
    }

    Ok(records)
}

/// Render a millisecond timestamp as RFC 3339 UTC for log output
fn format_utc(timestamp_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| timestamp_ms.to_string())
}
