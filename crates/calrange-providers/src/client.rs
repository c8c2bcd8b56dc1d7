//! The [`CalendarClient`] seam.
//!
//! A client is the boundary to whatever actually stores calendars: a remote
//! API, a local file, or memory. Authentication and session handling live
//! entirely behind it.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use calrange_core::{TimeNormalizer, Window};

use crate::error::ProviderResult;
use crate::raw_event::RawEvent;

/// A boxed future for object-safe async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One remote calendar feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CalendarSource {
    /// Human-readable calendar name.
    pub display_name: String,
    /// Where the feed lives; unique per source after deduplication.
    pub feed_locator: String,
}

impl CalendarSource {
    pub fn new(display_name: impl Into<String>, feed_locator: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            feed_locator: feed_locator.into(),
        }
    }
}

/// Removes sources whose feed locator was already seen, keeping the first.
pub fn dedup_sources(sources: Vec<CalendarSource>) -> Vec<CalendarSource> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(sources.len());

    for source in sources {
        if seen.insert(source.feed_locator.clone()) {
            info!(
                calendar = %source.display_name,
                feed = %source.feed_locator,
                "Using calendar"
            );
            unique.push(source);
        } else {
            debug!(
                calendar = %source.display_name,
                feed = %source.feed_locator,
                "Skipping duplicate calendar feed"
            );
        }
    }

    unique
}

/// The range handed to a client query.
///
/// Feed APIs usually filter by whole dates, so the query carries both the
/// exact window and the local dates of its bounds. Clients may return more
/// than the window; the aggregator re-filters every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryRange {
    pub window: Window,
    /// Local date of `window.since()`.
    pub start_min: NaiveDate,
    /// Local date of `window.until()`.
    pub start_max: NaiveDate,
}

impl QueryRange {
    /// Builds the query range for `window`, taking dates in the normalizer's zone.
    pub fn for_window(window: Window, normalizer: &TimeNormalizer) -> Self {
        let start_min = normalizer
            .date_of(window.since())
            .unwrap_or_else(|| window.since_utc().date_naive());
        let start_max = normalizer
            .date_of(window.until())
            .unwrap_or_else(|| window.until_utc().date_naive());
        Self {
            window,
            start_min,
            start_max,
        }
    }
}

/// Access to calendar feeds.
///
/// Implementations must be `Send + Sync`; the aggregator queries several
/// sources concurrently from a background task.
pub trait CalendarClient: Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &str;

    /// Lists the calendars available to the account, possibly with
    /// duplicate feed locators.
    fn list_calendars(&self) -> BoxFuture<'_, ProviderResult<Vec<CalendarSource>>>;

    /// Returns the raw events of one feed for `range`.
    fn query_events<'a>(
        &'a self,
        source: &'a CalendarSource,
        range: QueryRange,
    ) -> BoxFuture<'a, ProviderResult<Vec<RawEvent>>>;
}
