//! In-process calendar client.
//!
//! [`MemoryClient`] keeps its calendars in memory and can simulate slow or
//! broken feeds, which makes it the client of choice for tests and for
//! embedders that already hold their events.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::client::{BoxFuture, CalendarClient, CalendarSource, QueryRange};
use crate::error::{ProviderError, ProviderResult};
use crate::raw_event::RawEvent;

#[derive(Debug, Default)]
struct MemoryState {
    calendars: Vec<(CalendarSource, Vec<RawEvent>)>,
    latency: HashMap<String, Duration>,
    failing: HashSet<String>,
    query_counts: HashMap<String, usize>,
    last_ranges: HashMap<String, QueryRange>,
}

impl MemoryState {
    fn events(&self, feed: &str) -> Option<&Vec<RawEvent>> {
        self.calendars
            .iter()
            .find(|(source, _)| source.feed_locator == feed)
            .map(|(_, events)| events)
    }
}

/// A calendar client serving events from memory.
///
/// Queries return the whole feed; filtering to the window is left to the
/// aggregator.
#[derive(Debug, Default)]
pub struct MemoryClient {
    state: Mutex<MemoryState>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to add a calendar.
    ///
    /// Adding a second calendar with an existing feed locator lists it again
    /// but queries always serve the first one.
    pub fn with_calendar(
        self,
        display_name: impl Into<String>,
        feed_locator: impl Into<String>,
        events: Vec<RawEvent>,
    ) -> Self {
        self.lock()
            .calendars
            .push((CalendarSource::new(display_name, feed_locator), events));
        self
    }

    /// Builder method to delay every query of `feed`.
    pub fn with_latency(self, feed: impl Into<String>, latency: Duration) -> Self {
        self.lock().latency.insert(feed.into(), latency);
        self
    }

    /// Makes every following query of `feed` fail.
    pub fn fail_feed(&self, feed: impl Into<String>) {
        self.lock().failing.insert(feed.into());
    }

    /// Undoes [`MemoryClient::fail_feed`].
    pub fn restore_feed(&self, feed: &str) {
        self.lock().failing.remove(feed);
    }

    /// Replaces the events of the first calendar using `feed`.
    pub fn set_events(&self, feed: &str, events: Vec<RawEvent>) {
        let mut state = self.lock();
        if let Some((_, existing)) = state
            .calendars
            .iter_mut()
            .find(|(source, _)| source.feed_locator == feed)
        {
            *existing = events;
        }
    }

    /// Every calendar as listed, duplicates included.
    pub fn sources(&self) -> Vec<CalendarSource> {
        self.lock()
            .calendars
            .iter()
            .map(|(source, _)| source.clone())
            .collect()
    }

    /// Number of queries issued for `feed`, failed ones included.
    pub fn query_count(&self, feed: &str) -> usize {
        self.lock().query_counts.get(feed).copied().unwrap_or(0)
    }

    /// Total number of queries across all feeds.
    pub fn total_queries(&self) -> usize {
        self.lock().query_counts.values().sum()
    }

    /// The range of the most recent query for `feed`.
    pub fn last_range(&self, feed: &str) -> Option<QueryRange> {
        self.lock().last_ranges.get(feed).copied()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CalendarClient for MemoryClient {
    fn name(&self) -> &str {
        "memory"
    }

    fn list_calendars(&self) -> BoxFuture<'_, ProviderResult<Vec<CalendarSource>>> {
        Box::pin(async move { Ok(self.sources()) })
    }

    fn query_events<'a>(
        &'a self,
        source: &'a CalendarSource,
        range: QueryRange,
    ) -> BoxFuture<'a, ProviderResult<Vec<RawEvent>>> {
        Box::pin(async move {
            let feed = source.feed_locator.as_str();
            let latency = {
                let mut state = self.lock();
                *state.query_counts.entry(feed.to_string()).or_default() += 1;
                state.last_ranges.insert(feed.to_string(), range);
                state.latency.get(feed).copied()
            };

            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }

            let state = self.lock();
            if state.failing.contains(feed) {
                return Err(ProviderError::network(format!("feed {feed} is unreachable")));
            }
            state
                .events(feed)
                .cloned()
                .ok_or_else(|| ProviderError::not_found(format!("no calendar with feed {feed}")))
        })
    }
}
