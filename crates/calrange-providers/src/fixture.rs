//! JSON fixture file client.
//!
//! [`FileClient`] stands in for a remote feed by reading a local file:
//!
//! ```json
//! {
//!   "calendars": [
//!     {
//!       "name": "Work",
//!       "feed": "feed://work",
//!       "events": [
//!         {"id": "1", "title": "Standup", "spans": [{"start": "2024-01-03T09:00:00Z", "end": "2024-01-03T09:15:00Z"}]}
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! The file is read again on every call, so edits show up on the next
//! forced reload.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::client::{BoxFuture, CalendarClient, CalendarSource, QueryRange};
use crate::error::{ProviderError, ProviderResult};
use crate::raw_event::RawEvent;

#[derive(Debug, Deserialize)]
struct FixtureFile {
    #[serde(default)]
    calendars: Vec<FixtureCalendar>,
}

#[derive(Debug, Deserialize)]
struct FixtureCalendar {
    name: String,
    feed: String,
    #[serde(default)]
    events: Vec<RawEvent>,
}

/// A calendar client backed by a JSON fixture file.
#[derive(Debug, Clone)]
pub struct FileClient {
    path: PathBuf,
}

impl FileClient {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> ProviderResult<FixtureFile> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| {
                let message = format!("failed to read fixture {}: {}", self.path.display(), e);
                if e.kind() == std::io::ErrorKind::NotFound {
                    ProviderError::not_found(message)
                } else {
                    ProviderError::internal(message)
                }
            })?;

        let fixture: FixtureFile = serde_json::from_str(&content).map_err(|e| {
            ProviderError::invalid_response(format!(
                "failed to parse fixture {}",
                self.path.display()
            ))
            .with_source(e)
        })?;

        debug!(path = ?self.path, calendars = fixture.calendars.len(), "Loaded fixture");
        Ok(fixture)
    }
}

impl CalendarClient for FileClient {
    fn name(&self) -> &str {
        "fixture"
    }

    fn list_calendars(&self) -> BoxFuture<'_, ProviderResult<Vec<CalendarSource>>> {
        Box::pin(async move {
            let fixture = self.load().await?;
            Ok(fixture
                .calendars
                .into_iter()
                .map(|calendar| CalendarSource::new(calendar.name, calendar.feed))
                .collect())
        })
    }

    fn query_events<'a>(
        &'a self,
        source: &'a CalendarSource,
        _range: QueryRange,
    ) -> BoxFuture<'a, ProviderResult<Vec<RawEvent>>> {
        Box::pin(async move {
            let fixture = self.load().await?;
            fixture
                .calendars
                .into_iter()
                .find(|calendar| calendar.feed == source.feed_locator)
                .map(|calendar| calendar.events)
                .ok_or_else(|| {
                    ProviderError::not_found(format!(
                        "no calendar with feed {} in {}",
                        source.feed_locator,
                        self.path.display()
                    ))
                })
        })
    }
}
