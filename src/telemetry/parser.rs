//! # DSN Feed Parser
//!
//! Extracts signal records for one complex from the raw DSN activity feed.
//!
//! The feed is XML-like text in which each antenna appears as
//!
//! ```text
//! <dish name="DSS34" ...>
//!     <upSignal ... frequency="7100000000" power="20.0" spacecraft="MVN" .../>
//!     <downSignal ... frequency="8400000000" power="-120.5" spacecraft="MVN" .../>
//!     <target name="MVN" .../>
//! </dish>
//! ```
//!
//! and each complex carries a shared `timeUTC` timestamp on its `<station>`
//! element. Parsing is a pure function of its inputs.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use super::signal::{Direction, SignalRecord};
use crate::error::ParseError;

/// Closing tag that ends one dish block
const DISH_CLOSE: &str = "</dish>";

/// Opening marker of a dish element
const DISH_OPEN: &str = "<dish ";

/// Records extracted from a single feed snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot {
    /// Feed timestamp shared by every record (ms since epoch)
    pub timestamp: i64,

    /// Records from all valid dishes, in feed order
    pub records: Vec<SignalRecord>,
}

fn dish_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\bname="([^"]*)""#).expect("dish name pattern is valid"))
}

fn dish_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Three-letter site class (e.g. DSS) followed by exactly two digits
    RE.get_or_init(|| Regex::new(r"^[A-Za-z]{3}(\d{2})$").expect("dish id pattern is valid"))
}

fn signal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<(upSignal|downSignal)\b([^>]*)>").expect("signal pattern is valid")
    })
}

fn field_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\b(frequency|power|spacecraft)="([^"]*)""#).expect("field pattern is valid")
    })
}

/// Parse a raw feed blob for one complex
///
/// # Arguments
///
/// * `raw` - Complete feed text
/// * `station_name` - Friendly station name as it appears in the feed (e.g. "Canberra")
/// * `valid_dish_ids` - Two-digit dish identifiers owned by the station
///
/// # Returns
///
/// * `Result<FeedSnapshot, ParseError>` - Timestamp and records, or error if the blob is unusable
///
/// # Errors
///
/// Returns error if:
/// - The station's `timeUTC` attribute is missing ([`ParseError::MissingTimestamp`])
/// - A valid dish block has signal fields that do not line up ([`ParseError::FieldMisalignment`])
///
/// Dishes with malformed names or IDs outside `valid_dish_ids` are skipped, not errors.
///
/// # Examples
///
/// ```
/// use dsn_logger::telemetry::parser::parse_feed;
///
/// let raw = r#"<station friendlyName="Canberra" timeUTC="1665769200000"/>
/// <dish name="DSS34"><downSignal frequency="8400000000" power="-120.5" spacecraft="MVN"/></dish>"#;
///
/// let snapshot = parse_feed(raw, "Canberra", &[34, 35, 36, 43])?;
/// assert_eq!(snapshot.timestamp, 1665769200000);
/// assert_eq!(snapshot.records.len(), 1);
/// # Ok::<(), dsn_logger::error::ParseError>(())
/// ```
pub fn parse_feed(
    raw: &str,
    station_name: &str,
    valid_dish_ids: &[u8],
) -> Result<FeedSnapshot, ParseError> {
    let timestamp = extract_timestamp(raw, station_name)?;
    let mut records = Vec::new();

    for fragment in raw.split(DISH_CLOSE) {
        let Some(block) = dish_block(fragment) else {
            continue;
        };

        let Some(dish_id) = block.dish_id else {
            debug!("Skipping dish with malformed name {:?}", block.name);
            continue;
        };

        if !valid_dish_ids.contains(&dish_id) {
            continue;
        }

        decode_signals(&block, timestamp, &mut records)?;
    }

    Ok(FeedSnapshot { timestamp, records })
}

/// Find the first `<station_name>" timeUTC="<digits>"` in the feed
fn extract_timestamp(raw: &str, station_name: &str) -> Result<i64, ParseError> {
    let missing = || ParseError::MissingTimestamp {
        station: station_name.to_string(),
    };

    let needle = format!("{}\" timeUTC=\"", station_name);
    let start = raw.find(&needle).ok_or_else(missing)? + needle.len();
    let rest = &raw[start..];

    let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits_len == 0 || !rest[digits_len..].starts_with('"') {
        return Err(missing());
    }

    rest[..digits_len].parse().map_err(|_| missing())
}

/// One `<dish ...>...</dish>` region of the feed
#[derive(Debug)]
struct DishBlock<'a> {
    /// Raw `name` attribute (e.g. "DSS34")
    name: &'a str,
    /// Parsed two-digit ID, if the name is well-formed
    dish_id: Option<u8>,
    /// Everything after the opening tag's attributes
    body: &'a str,
}

/// Isolate the last dish element in a fragment that precedes `</dish>`
fn dish_block(fragment: &str) -> Option<DishBlock<'_>> {
    let open = fragment.rfind(DISH_OPEN)?;
    let element = &fragment[open + DISH_OPEN.len()..];

    let tag_end = element.find('>').unwrap_or(element.len());
    let attributes = &element[..tag_end];
    let name = dish_name_re()
        .captures(attributes)
        .and_then(|caps| caps.get(1))
        .map_or("", |m| m.as_str());

    Some(DishBlock {
        name,
        dish_id: parse_dish_id(name),
        body: &element[tag_end..],
    })
}

/// Parse the two-digit ID out of a dish name such as `DSS34`
fn parse_dish_id(name: &str) -> Option<u8> {
    dish_id_re()
        .captures(name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Decode every signal element of a dish block into `out`
///
/// Each `<upSignal>`/`<downSignal>` element yields one record built from
/// its own attributes. The block-wide counts of each field must also agree
/// with the number of signal elements; any stray field means the block
/// cannot be trusted.
fn decode_signals(
    block: &DishBlock<'_>,
    timestamp: i64,
    out: &mut Vec<SignalRecord>,
) -> Result<(), ParseError> {
    let misaligned = |detail: String| ParseError::FieldMisalignment {
        dish: block.name.to_string(),
        detail,
    };

    let mut counts = FieldCounts::default();
    for caps in field_re().captures_iter(block.body) {
        counts.bump(&caps[1]);
    }

    let signals: Vec<_> = signal_re().captures_iter(block.body).collect();
    if !counts.all_equal(signals.len()) {
        return Err(misaligned(format!(
            "{} signal markers, {} frequency, {} power, {} spacecraft",
            signals.len(),
            counts.frequency,
            counts.power,
            counts.spacecraft
        )));
    }

    for caps in &signals {
        // The signal pattern only matches the two known markers
        let Some(direction) = Direction::from_feed_marker(&caps[1]) else {
            continue;
        };
        let fields = SignalFields::from_attributes(&caps[2]);

        let (Some(frequency), Some(power), Some(spacecraft)) =
            (fields.frequency, fields.power, fields.spacecraft)
        else {
            return Err(misaligned(format!(
                "{} element is missing frequency, power or spacecraft",
                direction.feed_marker()
            )));
        };

        if frequency.is_empty() && power.is_empty() {
            // Idle carrier: no measurement to record
            continue;
        }

        let frequency: u64 = frequency.parse().map_err(|_| {
            misaligned(format!("invalid frequency {:?} in {}", frequency, direction.feed_marker()))
        })?;

        let power: f64 = power
            .parse()
            .ok()
            .filter(|p: &f64| p.is_finite())
            .ok_or_else(|| {
                misaligned(format!("invalid power {:?} in {}", power, direction.feed_marker()))
            })?;

        let spacecraft = spacecraft.trim();
        if spacecraft.is_empty() {
            return Err(misaligned(format!(
                "empty spacecraft in {}",
                direction.feed_marker()
            )));
        }

        out.push(SignalRecord::new(timestamp, frequency, power, spacecraft, direction));
    }

    Ok(())
}

/// Occurrences of each measured field in a dish block
#[derive(Debug, Default)]
struct FieldCounts {
    frequency: usize,
    power: usize,
    spacecraft: usize,
}

impl FieldCounts {
    fn bump(&mut self, field: &str) {
        match field {
            "frequency" => self.frequency += 1,
            "power" => self.power += 1,
            "spacecraft" => self.spacecraft += 1,
            _ => {}
        }
    }

    fn all_equal(&self, markers: usize) -> bool {
        self.frequency == markers && self.power == markers && self.spacecraft == markers
    }
}

/// Measured attributes of one signal element
#[derive(Debug, Default)]
struct SignalFields<'a> {
    frequency: Option<&'a str>,
    power: Option<&'a str>,
    spacecraft: Option<&'a str>,
}

impl<'a> SignalFields<'a> {
    fn from_attributes(attributes: &'a str) -> Self {
        let mut fields = Self::default();
        for caps in field_re().captures_iter(attributes) {
            let value = caps.get(2).map_or("", |m| m.as_str());
            match &caps[1] {
                "frequency" => fields.frequency = Some(value),
                "power" => fields.power = Some(value),
                "spacecraft" => fields.spacecraft = Some(value),
                _ => {}
            }
        }
        fields
    }
}
