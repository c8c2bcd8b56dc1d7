//! Raw event records as handed out by a calendar client.
//!
//! Times stay as the source wrote them; normalization happens in the
//! aggregator so every client shares the same parsing rules.

use serde::{Deserialize, Serialize};

/// One occurrence of an event, as raw `(start, end)` strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTimeSpan {
    pub start: String,
    pub end: String,
}

impl RawTimeSpan {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }
}

/// An event record from a calendar feed.
///
/// A record may carry several spans (recurring or multi-occurrence events);
/// each span becomes its own normalized event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Opaque id, unique only within its feed.
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "when")]
    pub spans: Vec<RawTimeSpan>,
}

impl RawEvent {
    /// Creates a record without spans.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            spans: Vec::new(),
        }
    }

    /// Builder method to append a span.
    pub fn with_span(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.spans.push(RawTimeSpan::new(start, end));
        self
    }
}
