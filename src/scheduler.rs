//! # Poll Scheduler
//!
//! Drives the fixed-interval fetch-or-flush loop for one station.
//!
//! Every tick looks at the station's buffer size:
//!
//! - below the threshold (`ACCUMULATING`): fetch the feed, parse it and
//!   append the records
//! - at or above it (`DRAINING`): flush both buffers to the signal logs
//!
//! The state is recomputed on every tick, so a drained station goes straight
//! back to accumulating. A failed tick is logged and the loop carries on.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::error::{DsnLoggerError, Result};
use crate::feed::FeedFetcher;
use crate::telemetry::logger::LogWriter;
use crate::telemetry::parser::parse_feed;
use crate::telemetry::station::Station;

/// What the next tick will do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Buffer below threshold: fetch and append
    Accumulating,
    /// Buffer at threshold: flush and clear
    Draining,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerState::Accumulating => write!(f, "ACCUMULATING"),
            SchedulerState::Draining => write!(f, "DRAINING"),
        }
    }
}

/// Result of a single successful tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Feed fetched and parsed; `appended` records were buffered
    Fetched { appended: usize },
    /// Buffers flushed to `files`
    Flushed { files: Vec<PathBuf> },
}

/// Fetch-or-flush loop for one station
pub struct Scheduler<F: FeedFetcher> {
    station: Station,
    fetcher: F,
    writer: LogWriter,
    interval: Duration,
    threshold: usize,
    fetch_timeout: Duration,
}

impl<F: FeedFetcher> fmt::Debug for Scheduler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("station", &self.station.name())
            .field("interval", &self.interval)
            .field("threshold", &self.threshold)
            .field("fetch_timeout", &self.fetch_timeout)
            .finish_non_exhaustive()
    }
}

impl<F: FeedFetcher> Scheduler<F> {
    /// Create a scheduler
    ///
    /// The fetch timeout defaults to one interval; see
    /// [`Scheduler::with_fetch_timeout`].
    pub fn new(station: Station, fetcher: F, writer: LogWriter, config: &SchedulerConfig) -> Self {
        let interval = config.interval();
        Self {
            station,
            fetcher,
            writer,
            interval,
            threshold: config.threshold,
            fetch_timeout: interval,
        }
    }

    /// Bound how long a single fetch may block the loop
    #[must_use]
    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub fn station(&self) -> &Station {
        &self.station
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// State the next tick will run in
    pub fn state(&self) -> SchedulerState {
        if self.station.size() < self.threshold {
            SchedulerState::Accumulating
        } else {
            SchedulerState::Draining
        }
    }

    /// Run one fetch-or-flush step
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The fetch fails or times out ([`DsnLoggerError::Fetch`])
    /// - The feed cannot be parsed ([`DsnLoggerError::Parse`]); nothing is appended
    /// - A log file cannot be written; the unwritten buffer is kept
    pub async fn tick(&mut self) -> Result<TickOutcome> {
        match self.state() {
            SchedulerState::Accumulating => {
                let appended = self.fetch_cycle().await?;
                Ok(TickOutcome::Fetched { appended })
            }
            SchedulerState::Draining => {
                let files = self.station.flush_and_clear(&self.writer)?;
                Ok(TickOutcome::Flushed { files })
            }
        }
    }

    async fn fetch_cycle(&mut self) -> Result<usize> {
        let limit = self.fetch_timeout;
        let raw = timeout(limit, self.fetcher.fetch())
            .await
            .map_err(|_| DsnLoggerError::Fetch(format!("Feed fetch timed out after {:?}", limit)))??;

        let snapshot = parse_feed(&raw, self.station.name(), self.station.valid_dish_ids())?;
        let appended = snapshot.records.len();
        self.station.extend(snapshot.records);

        debug!(
            "{}: appended {} records at {} (uplink {}, downlink {})",
            self.station.name(),
            appended,
            snapshot.timestamp,
            self.station.uplink().len(),
            self.station.downlink().len()
        );

        Ok(appended)
    }

    /// Run until Ctrl+C, then flush whatever is buffered
    pub async fn run(&mut self) {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;
    }

    /// Run until `shutdown` completes, then flush whatever is buffered
    pub async fn run_until<S>(&mut self, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            "Polling {} every {:?} (flush at {} downlink records)",
            self.station.name(),
            self.interval,
            self.threshold
        );

        let mut ticks: u64 = 0;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    ticks += 1;
                    let state = self.state();

                    match self.tick().await {
                        Ok(TickOutcome::Fetched { appended }) => {
                            debug!("Tick {} ({}): {} records", ticks, state, appended);
                        }
                        Ok(TickOutcome::Flushed { files }) => {
                            info!("Tick {} ({}): wrote {} log file(s)", ticks, state, files.len());
                        }
                        Err(e) => {
                            warn!("Tick {} ({}) failed: {}", ticks, state, e);
                        }
                    }
                }

                _ = &mut shutdown => {
                    info!("Shutting down after {} ticks", ticks);
                    break;
                }
            }
        }

        if !self.station.is_empty() {
            info!(
                "Flushing {} buffered records before exit",
                self.station.total_len()
            );
            if let Err(e) = self.station.flush_and_clear(&self.writer) {
                error!("Final flush failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;
    use crate::feed::MockFeedFetcher;
    use crate::telemetry::logger::read_log;
    use crate::telemetry::signal::{Direction, SignalRecord};
    use crate::telemetry::station::StationId;
    use async_trait::async_trait;
    use std::fs;
    use tempfile::TempDir;

    const CANBERRA_FEED: &str = concat!(
        "<dsn>\n",
        "<station name=\"cdscc\" friendlyName=\"Canberra\" timeUTC=\"1665769200000\" timeZoneOffset=\"39600000\"/>\n",
        "<dish name=\"DSS34\" azimuthAngle=\"120.1\" elevationAngle=\"45.0\" activity=\"Spacecraft Telemetry\">\n",
        "<downSignal active=\"true\" signalType=\"data\" dataRate=\"2000\" frequency=\"8400000000\" band=\"X\" power=\"-120.5\" spacecraft=\"MVN\" spacecraftID=\"-202\"/>\n",
        "<target name=\"MVN\" id=\"202\"/>\n",
        "</dish>\n",
        "<dish name=\"DSS14\" azimuthAngle=\"80.0\" elevationAngle=\"20.0\" activity=\"\">\n",
        "<downSignal active=\"true\" signalType=\"data\" dataRate=\"160\" frequency=\"8420000000\" band=\"X\" power=\"-155.0\" spacecraft=\"VGR1\" spacecraftID=\"-31\"/>\n",
        "</dish>\n",
        "</dsn>\n"
    );

    fn config(threshold: usize) -> SchedulerConfig {
        SchedulerConfig {
            interval_s: 1,
            threshold,
        }
    }

    fn canberra() -> Station {
        Station::new(StationId::Canberra.config())
    }

    fn downlink(t: i64) -> SignalRecord {
        SignalRecord::new(t, 8_400_000_000, -120.5, "MVN", Direction::Downlink)
    }

    fn feed_returning(raw: &'static str, times: usize) -> MockFeedFetcher {
        let mut fetcher = MockFeedFetcher::new();
        fetcher
            .expect_fetch()
            .times(times)
            .returning(move || Ok(raw.to_string()));
        fetcher
    }

    #[test]
    fn test_initial_state_is_accumulating() {
        let dir = TempDir::new().unwrap();
        let scheduler = Scheduler::new(canberra(), MockFeedFetcher::new(), LogWriter::new(dir.path()), &config(1000));
        assert_eq!(scheduler.state(), SchedulerState::Accumulating);
        assert_eq!(scheduler.interval(), Duration::from_secs(1));
        assert_eq!(scheduler.threshold(), 1000);
    }

    #[tokio::test]
    async fn test_below_threshold_fetches() {
        let dir = TempDir::new().unwrap();
        let mut station = canberra();
        station.extend((0..999).map(downlink));

        let mut scheduler = Scheduler::new(station, feed_returning(CANBERRA_FEED, 1), LogWriter::new(dir.path()), &config(1000));
        assert_eq!(scheduler.state(), SchedulerState::Accumulating);

        let outcome = scheduler.tick().await.unwrap();

        assert_eq!(outcome, TickOutcome::Fetched { appended: 1 });
        assert_eq!(scheduler.station().downlink().len(), 1000);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_at_threshold_flushes() {
        let dir = TempDir::new().unwrap();
        let mut station = canberra();
        station.extend((0..1000).map(downlink));

        // No fetch may happen on a draining tick
        let mut fetcher = MockFeedFetcher::new();
        fetcher.expect_fetch().never();

        let mut scheduler = Scheduler::new(station, fetcher, LogWriter::new(dir.path()), &config(1000));
        assert_eq!(scheduler.state(), SchedulerState::Draining);

        let outcome = scheduler.tick().await.unwrap();

        let expected = dir.path().join("Canberra_0_999_down.csv");
        assert_eq!(outcome, TickOutcome::Flushed { files: vec![expected.clone()] });
        assert_eq!(read_log(&expected, Direction::Downlink).unwrap().len(), 1000);
        assert!(scheduler.station().is_empty());
        assert_eq!(scheduler.state(), SchedulerState::Accumulating);
    }

    #[test]
    fn test_uplink_volume_does_not_gate() {
        let dir = TempDir::new().unwrap();
        let mut station = canberra();
        station.extend((0..5).map(|t| SignalRecord::new(t, 7_100_000_000, 20.0, "MVN", Direction::Uplink)));

        let scheduler = Scheduler::new(station, MockFeedFetcher::new(), LogWriter::new(dir.path()), &config(3));
        assert_eq!(scheduler.state(), SchedulerState::Accumulating);
    }

    #[tokio::test]
    async fn test_parse_error_appends_nothing() {
        let dir = TempDir::new().unwrap();
        let mut scheduler = Scheduler::new(
            canberra(),
            feed_returning("<dsn>maintenance</dsn>", 1),
            LogWriter::new(dir.path()),
            &config(1000),
        );

        match scheduler.tick().await {
            Err(DsnLoggerError::Parse(ParseError::MissingTimestamp { station })) => {
                assert_eq!(station, "Canberra");
            }
            other => panic!("Expected MissingTimestamp, got: {:?}", other),
        }
        assert!(scheduler.station().is_empty());
    }

    #[tokio::test]
    async fn test_misaligned_feed_appends_nothing() {
        const BROKEN: &str = concat!(
            "<station friendlyName=\"Canberra\" timeUTC=\"5\"/>",
            "<dish name=\"DSS35\">",
            "<downSignal frequency=\"1\" power=\"-1.0\" spacecraft=\"A\"/>",
            "<downSignal frequency=\"2\" power=\"-2.0\"/>",
            "</dish>",
            "<dish name=\"DSS36\"><downSignal frequency=\"3\" power=\"-3.0\" spacecraft=\"B\"/></dish>"
        );
        let dir = TempDir::new().unwrap();
        let mut scheduler = Scheduler::new(canberra(), feed_returning(BROKEN, 1), LogWriter::new(dir.path()), &config(1000));

        assert!(matches!(
            scheduler.tick().await,
            Err(DsnLoggerError::Parse(ParseError::FieldMisalignment { .. }))
        ));
        assert!(scheduler.station().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_error_is_returned() {
        let dir = TempDir::new().unwrap();
        let mut fetcher = MockFeedFetcher::new();
        fetcher
            .expect_fetch()
            .times(1)
            .returning(|| Err(DsnLoggerError::Fetch("connection reset".to_string())));

        let mut scheduler = Scheduler::new(canberra(), fetcher, LogWriter::new(dir.path()), &config(1000));

        assert!(matches!(scheduler.tick().await, Err(DsnLoggerError::Fetch(_))));
        assert!(scheduler.station().is_empty());
    }

    struct StalledFetcher;

    #[async_trait]
    impl FeedFetcher for StalledFetcher {
        async fn fetch(&self) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(CANBERRA_FEED.to_string())
        }
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let dir = TempDir::new().unwrap();
        let mut scheduler = Scheduler::new(canberra(), StalledFetcher, LogWriter::new(dir.path()), &config(1000))
            .with_fetch_timeout(Duration::from_millis(20));

        match scheduler.tick().await {
            Err(DsnLoggerError::Fetch(msg)) => assert!(msg.contains("timed out"), "msg: {}", msg),
            other => panic!("Expected Fetch timeout, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_end_to_end_canberra() {
        let dir = TempDir::new().unwrap();
        let mut scheduler = Scheduler::new(canberra(), feed_returning(CANBERRA_FEED, 1), LogWriter::new(dir.path()), &config(1));

        assert_eq!(scheduler.tick().await.unwrap(), TickOutcome::Fetched { appended: 1 });
        assert_eq!(
            scheduler.station().downlink(),
            &[SignalRecord::new(1665769200000, 8400000000, -120.5, "MVN", Direction::Downlink)]
        );
        assert_eq!(scheduler.state(), SchedulerState::Draining);

        let outcome = scheduler.tick().await.unwrap();

        let path = dir.path().join("Canberra_1665769200000_1665769200000_down.csv");
        assert_eq!(outcome, TickOutcome::Flushed { files: vec![path.clone()] });
        assert_eq!(fs::read_to_string(&path).unwrap(), "1665769200000,8400000000,-120.500000,MVN\n");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_run_until_flushes_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let mut scheduler = Scheduler::new(canberra(), feed_returning(CANBERRA_FEED, 1), LogWriter::new(dir.path()), &config(1000));

        // First tick fires immediately; shutdown lands well before the second
        scheduler
            .run_until(tokio::time::sleep(Duration::from_millis(200)))
            .await;

        assert!(scheduler.station().is_empty());
        let path = dir.path().join("Canberra_1665769200000_1665769200000_down.csv");
        assert_eq!(read_log(&path, Direction::Downlink).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_run_until_survives_failed_ticks() {
        let dir = TempDir::new().unwrap();
        let mut fetcher = MockFeedFetcher::new();
        fetcher
            .expect_fetch()
            .times(1)
            .returning(|| Err(DsnLoggerError::Fetch("unreachable".to_string())));

        let mut scheduler = Scheduler::new(canberra(), fetcher, LogWriter::new(dir.path()), &config(1000));
        scheduler
            .run_until(tokio::time::sleep(Duration::from_millis(200)))
            .await;

        assert!(scheduler.station().is_empty());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SchedulerState::Accumulating.to_string(), "ACCUMULATING");
        assert_eq!(SchedulerState::Draining.to_string(), "DRAINING");
    }
}
