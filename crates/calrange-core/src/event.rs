//! Event types.
//!
//! - [`Event`]: a reconciled event, normalized to Unix timestamps
//! - [`EventRecord`]: the tuple shape handed back to query callers

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::window::Window;

/// A calendar event normalized from a source feed.
///
/// Source event ids are only unique within their feed, so every event also
/// records the locator of the feed it came from; [`Event::key`] is the
/// source-scoped identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    source: String,
    source_event_id: String,
    title: String,
    start: i64,
    end: i64,
    all_day: bool,
}

impl Event {
    /// Creates a new event.
    pub fn new(
        source: impl Into<String>,
        source_event_id: impl Into<String>,
        title: impl Into<String>,
        start: i64,
        end: i64,
        all_day: bool,
    ) -> Self {
        Self {
            source: source.into(),
            source_event_id: source_event_id.into(),
            title: title.into(),
            start,
            end,
            all_day,
        }
    }

    /// Feed locator of the source this event came from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Opaque id assigned by the source.
    pub fn source_event_id(&self) -> &str {
        &self.source_event_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Start as a Unix timestamp.
    pub fn start(&self) -> i64 {
        self.start
    }

    /// End as a Unix timestamp.
    pub fn end(&self) -> i64 {
        self.end
    }

    pub fn is_all_day(&self) -> bool {
        self.all_day
    }

    /// Source-scoped identity: `(feed locator, source event id)`.
    pub fn key(&self) -> (&str, &str) {
        (&self.source, &self.source_event_id)
    }

    /// Returns `true` if this event belongs to `window`.
    pub fn overlaps(&self, window: &Window) -> bool {
        crate::window::overlaps(self, window)
    }
}

/// The record returned for each event by a range query.
///
/// `uid` and `description` are always empty and `extras` is reserved for
/// the transport layer; the core never fills them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub uid: String,
    pub summary: String,
    pub description: String,
    pub all_day: bool,
    pub start: i64,
    pub end: i64,
    pub extras: BTreeMap<String, serde_json::Value>,
}

impl From<&Event> for EventRecord {
    fn from(event: &Event) -> Self {
        Self {
            uid: String::new(),
            summary: event.title.clone(),
            description: String::new(),
            all_day: event.all_day,
            start: event.start,
            end: event.end,
            extras: BTreeMap::new(),
        }
    }
}
