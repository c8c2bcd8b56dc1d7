//! Query windows and the event overlap rule.
//!
//! A [`Window`] is a half-open `[since, until)` range of Unix timestamps. It
//! is both the argument of a range query and, verbatim, the cache key for
//! its result: two windows are the same only if both bounds are identical.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use crate::event::Event;

/// Errors raised when building a [`Window`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WindowError {
    /// The start is not strictly before the end.
    #[error("invalid window: since ({since}) must be before until ({until})")]
    NotIncreasing { since: i64, until: i64 },

    /// A bound cannot be represented as a calendar date.
    #[error("invalid window: timestamp {0} is out of range")]
    OutOfRange(i64),
}

/// A half-open `[since, until)` query range in Unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window {
    since: i64,
    until: i64,
}

impl Window {
    /// Creates a window, rejecting empty, inverted and unrepresentable ranges.
    pub fn new(since: i64, until: i64) -> Result<Self, WindowError> {
        if since >= until {
            return Err(WindowError::NotIncreasing { since, until });
        }
        for bound in [since, until] {
            if DateTime::<Utc>::from_timestamp(bound, 0).is_none() {
                return Err(WindowError::OutOfRange(bound));
            }
        }
        Ok(Self { since, until })
    }

    /// Inclusive start.
    pub fn since(&self) -> i64 {
        self.since
    }

    /// Exclusive end.
    pub fn until(&self) -> i64 {
        self.until
    }

    /// Length of the window in seconds.
    pub fn duration_secs(&self) -> i64 {
        self.until - self.since
    }

    /// Start as a UTC datetime.
    pub fn since_utc(&self) -> DateTime<Utc> {
        to_utc(self.since)
    }

    /// End as a UTC datetime.
    pub fn until_utc(&self) -> DateTime<Utc> {
        to_utc(self.until)
    }

    /// Returns `true` if `timestamp` lies in `[since, until)`.
    pub fn contains(&self, timestamp: i64) -> bool {
        self.since <= timestamp && timestamp < self.until
    }

    /// Decides whether an event spanning `start..end` belongs to this window.
    ///
    /// An event is admitted when it starts inside the window, or when it
    /// starts at or before `since` and is still running one second after
    /// `since`:
    ///
    /// ```text
    /// (start >= since && start < until) || (start <= since && end - 1 > since)
    /// ```
    ///
    /// The rule is one-sided: events already running at `since` are never
    /// compared against `until`, and an event ending exactly one second after
    /// `since` is rejected.
    pub fn admits(&self, start: i64, end: i64) -> bool {
        let starts_inside = start >= self.since && start < self.until;
        let running_at_open = start <= self.since && end.saturating_sub(1) > self.since;
        starts_inside || running_at_open
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.since_utc().to_rfc3339_opts(SecondsFormat::Secs, true),
            self.until_utc().to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }
}

/// Returns `true` if `event` overlaps `window` according to [`Window::admits`].
pub fn overlaps(event: &Event, window: &Window) -> bool {
    window.admits(event.start(), event.end())
}

fn to_utc(timestamp: i64) -> DateTime<Utc> {
    // Bounds are validated in `Window::new`.
    DateTime::<Utc>::from_timestamp(timestamp, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
}
