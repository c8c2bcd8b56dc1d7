//! Source aggregation.
//!
//! [`SourceAggregator`] queries every configured calendar source for a
//! window, normalizes each raw span and keeps the events the overlap
//! predicate admits. A failing source only costs its own events.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, info, trace, warn};

use calrange_core::{Event, NormalizedTime, TimeError, TimeNormalizer, Window};

use crate::client::{CalendarClient, CalendarSource, QueryRange, dedup_sources};
use crate::error::{AggregateError, ProviderError, ProviderResult};
use crate::raw_event::RawEvent;

/// Default per-source query timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// A source that could not be queried during a fetch.
#[derive(Debug)]
pub struct SourceFailure {
    pub source: CalendarSource,
    pub error: ProviderError,
}

/// Outcome of one aggregation run.
#[derive(Debug, Default)]
pub struct FetchReport {
    /// Admitted events, in source order then feed order.
    pub events: Vec<Event>,
    /// Sources that failed; their events are missing from `events`.
    pub failures: Vec<SourceFailure>,
    /// Spans dropped because a time could not be parsed.
    pub malformed: usize,
    /// Spans dropped by the overlap predicate.
    pub discarded: usize,
}

impl FetchReport {
    /// Returns true if some, but not all, sources failed.
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Fetches and reconciles events from a fixed set of calendar sources.
pub struct SourceAggregator {
    client: Arc<dyn CalendarClient>,
    sources: Vec<CalendarSource>,
    normalizer: TimeNormalizer,
    fetch_timeout: Duration,
}

impl std::fmt::Debug for SourceAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceAggregator")
            .field("client", &self.client.name())
            .field("sources", &self.sources)
            .field("normalizer", &self.normalizer)
            .field("fetch_timeout", &self.fetch_timeout)
            .finish()
    }
}

impl SourceAggregator {
    /// Creates an aggregator over `sources`, dropping duplicate feeds.
    pub fn new(client: Arc<dyn CalendarClient>, sources: Vec<CalendarSource>) -> Self {
        Self {
            client,
            sources: dedup_sources(sources),
            normalizer: TimeNormalizer::default(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Creates an aggregator over every calendar the client lists.
    pub async fn discover(client: Arc<dyn CalendarClient>) -> ProviderResult<Self> {
        let listed = client
            .list_calendars()
            .await
            .map_err(|e| e.with_provider(client.name().to_string()))?;
        info!(
            client = client.name(),
            listed = listed.len(),
            "Discovered calendars"
        );
        Ok(Self::new(client, listed))
    }

    /// Builder method to set the anchor zone used for all-day dates.
    pub fn with_normalizer(mut self, normalizer: TimeNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Builder method to set the per-source query timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// The deduplicated sources, in query order.
    pub fn sources(&self) -> &[CalendarSource] {
        &self.sources
    }

    pub fn normalizer(&self) -> &TimeNormalizer {
        &self.normalizer
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    /// Fetches every source for `window`.
    ///
    /// Sources are queried concurrently; the report keeps their configured
    /// order. Fails only when at least one source is configured and none of
    /// them answered.
    pub async fn fetch(&self, window: Window) -> Result<FetchReport, AggregateError> {
        let range = QueryRange::for_window(window, &self.normalizer);
        info!(
            %window,
            start_min = %range.start_min,
            start_max = %range.start_max,
            sources = self.sources.len(),
            "Fetching events"
        );

        let queries = self.sources.iter().map(|source| self.query(source, range));
        let answers = join_all(queries).await;

        let mut report = FetchReport::default();
        for (source, answer) in self.sources.iter().zip(answers) {
            match answer {
                Ok(raw_events) => self.reconcile(source, raw_events, &window, &mut report),
                Err(error) => {
                    warn!(
                        calendar = %source.display_name,
                        feed = %source.feed_locator,
                        error = %error,
                        "Calendar source unavailable"
                    );
                    report.failures.push(SourceFailure {
                        source: source.clone(),
                        error,
                    });
                }
            }
        }

        if !self.sources.is_empty() && report.failures.len() == self.sources.len() {
            return Err(AggregateError::AllSourcesUnavailable {
                failures: report.failures,
            });
        }

        info!(
            %window,
            events = report.events.len(),
            failed_sources = report.failures.len(),
            malformed = report.malformed,
            discarded = report.discarded,
            "Fetch complete"
        );
        Ok(report)
    }

    async fn query(
        &self,
        source: &CalendarSource,
        range: QueryRange,
    ) -> ProviderResult<Vec<RawEvent>> {
        debug!(calendar = %source.display_name, feed = %source.feed_locator, "Querying source");
        let provider = self.client.name().to_string();
        match tokio::time::timeout(self.fetch_timeout, self.client.query_events(source, range))
            .await
        {
            Ok(Ok(events)) => Ok(events),
            Ok(Err(e)) => Err(e.with_provider(provider)),
            Err(_) => Err(ProviderError::timeout(format!(
                "no answer from {} within {:?}",
                source.feed_locator, self.fetch_timeout
            ))
            .with_provider(provider)),
        }
    }

    fn reconcile(
        &self,
        source: &CalendarSource,
        raw_events: Vec<RawEvent>,
        window: &Window,
        report: &mut FetchReport,
    ) {
        for raw in raw_events {
            for span in &raw.spans {
                let (start, end) = match self.normalize_span(&span.start, &span.end) {
                    Ok(times) => times,
                    Err(e) => {
                        warn!(
                            feed = %source.feed_locator,
                            event_id = %raw.id,
                            value = e.raw(),
                            "Skipping event with malformed time"
                        );
                        report.malformed += 1;
                        continue;
                    }
                };

                let event = Event::new(
                    source.feed_locator.clone(),
                    raw.id.clone(),
                    raw.title.clone(),
                    start.timestamp,
                    end.timestamp,
                    start.all_day,
                );

                if event.overlaps(window) {
                    report.events.push(event);
                } else {
                    trace!(
                        feed = %source.feed_locator,
                        event_id = %raw.id,
                        title = %raw.title,
                        start = start.timestamp,
                        end = end.timestamp,
                        "Event outside of range"
                    );
                    report.discarded += 1;
                }
            }
        }
    }

    fn normalize_span(
        &self,
        start: &str,
        end: &str,
    ) -> Result<(NormalizedTime, NormalizedTime), TimeError> {
        let start = self.normalizer.parse(start)?;
        let end = self.normalizer.parse(end)?;
        Ok((start, end))
    }
}
