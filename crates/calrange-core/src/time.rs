//! Time normalization for calendar feed values.
//!
//! Calendar sources hand out two shapes of time string:
//! - a bare calendar date (`2024-01-03`) for all-day events
//! - an extended ISO-8601 instant with a numeric UTC offset
//!   (`2024-01-03T10:00:00.000+01:00`, or `Z`) for everything else
//!
//! [`ParsedTime`] is the tagged parse result and [`TimeNormalizer`] turns it
//! into a Unix timestamp plus an all-day flag.

use std::fmt;

use chrono::{
    DateTime, Duration, FixedOffset, Local, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc,
};
use thiserror::Error;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Instant format without a colon in the offset (`+0100`), which RFC 3339
/// parsing rejects.
const BASIC_OFFSET_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

/// Errors produced while normalizing a time string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeError {
    /// Neither the date-only nor the instant format matched.
    #[error("malformed time string: {raw:?}")]
    Malformed { raw: String },
}

impl TimeError {
    /// Creates a malformed time error for the given input.
    pub fn malformed(raw: impl Into<String>) -> Self {
        Self::Malformed { raw: raw.into() }
    }

    /// Returns the offending input.
    pub fn raw(&self) -> &str {
        match self {
            Self::Malformed { raw } => raw,
        }
    }
}

/// A successfully parsed feed time, before anchoring to a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedTime {
    /// A calendar date without a time of day.
    Date(NaiveDate),
    /// A specific instant carrying the offset written in the feed.
    Instant(DateTime<FixedOffset>),
}

impl ParsedTime {
    /// Parses a feed time string.
    ///
    /// The date-only format is tried first; the instant format is the
    /// fallback. Surrounding whitespace is ignored.
    pub fn parse(raw: &str) -> Result<Self, TimeError> {
        let trimmed = raw.trim();

        if let Ok(date) = NaiveDate::parse_from_str(trimmed, DATE_FORMAT) {
            return Ok(Self::Date(date));
        }

        DateTime::parse_from_rfc3339(trimmed)
            .or_else(|_| DateTime::parse_from_str(trimmed, BASIC_OFFSET_FORMAT))
            .map(Self::Instant)
            .map_err(|_| TimeError::malformed(raw))
    }

    /// Returns `true` for the date-only variant.
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::Date(_))
    }
}

/// A normalized `(timestamp, all_day)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedTime {
    /// Unix timestamp in seconds.
    pub timestamp: i64,
    /// Whether the source value was a bare date.
    pub all_day: bool,
}

/// The zone all-day dates are anchored in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AnchorZone {
    /// The process-local timezone.
    #[default]
    Local,
    /// A fixed UTC offset.
    Fixed(FixedOffset),
}

impl fmt::Display for AnchorZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Fixed(offset) => write!(f, "{}", offset),
        }
    }
}

/// Converts feed time strings into Unix timestamps.
///
/// Instants keep the offset written in the feed; no timezone database lookup
/// or DST correction is applied to them. All-day dates are anchored at
/// midnight in the configured [`AnchorZone`], which is where platform DST
/// rules can shift the result:
/// - an ambiguous midnight (clocks falling back) resolves to the earlier instant
/// - a midnight skipped by a DST gap resolves to the first valid instant after it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeNormalizer {
    zone: AnchorZone,
}

impl TimeNormalizer {
    /// Creates a normalizer anchoring all-day dates in the local timezone.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a normalizer anchoring all-day dates at a fixed offset.
    pub fn with_fixed_offset(offset: FixedOffset) -> Self {
        Self {
            zone: AnchorZone::Fixed(offset),
        }
    }

    /// Returns the anchor zone.
    pub fn zone(&self) -> AnchorZone {
        self.zone
    }

    /// Parses and normalizes a feed time string.
    pub fn parse(&self, raw: &str) -> Result<NormalizedTime, TimeError> {
        ParsedTime::parse(raw).map(|parsed| self.normalize(&parsed))
    }

    /// Normalizes an already parsed time.
    pub fn normalize(&self, parsed: &ParsedTime) -> NormalizedTime {
        match parsed {
            ParsedTime::Date(date) => NormalizedTime {
                timestamp: self.midnight(*date),
                all_day: true,
            },
            ParsedTime::Instant(instant) => NormalizedTime {
                timestamp: instant.timestamp(),
                all_day: false,
            },
        }
    }

    /// Returns the timestamp of midnight on `date` in the anchor zone.
    pub fn midnight(&self, date: NaiveDate) -> i64 {
        match self.zone {
            AnchorZone::Local => midnight_in(date, &Local),
            AnchorZone::Fixed(offset) => midnight_in(date, &offset),
        }
    }

    /// Returns the calendar date of a timestamp in the anchor zone.
    pub fn date_of(&self, timestamp: i64) -> Option<NaiveDate> {
        let instant = DateTime::<Utc>::from_timestamp(timestamp, 0)?;
        let date = match self.zone {
            AnchorZone::Local => instant.with_timezone(&Local).date_naive(),
            AnchorZone::Fixed(offset) => instant.with_timezone(&offset).date_naive(),
        };
        Some(date)
    }
}

fn midnight_in<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> i64 {
    let midnight = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(dt) => dt.timestamp(),
        // chrono does not order the two candidates
        LocalResult::Ambiguous(a, b) => a.timestamp().min(b.timestamp()),
        LocalResult::None => (1..=16)
            .map(|quarter| midnight + Duration::minutes(15 * quarter))
            .find_map(|candidate| tz.from_local_datetime(&candidate).earliest())
            .map(|dt| dt.timestamp())
            .unwrap_or_else(|| midnight.and_utc().timestamp()),
    }
}
