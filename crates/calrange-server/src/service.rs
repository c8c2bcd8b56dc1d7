//! The query facade.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use calrange_core::{EventRecord, Window};
use calrange_providers::{CalendarClient, CalendarSource, SourceAggregator};

use crate::cache::{CacheStats, Lookup, RangeCache};
use crate::config::ServiceConfig;
use crate::error::ServerResult;

/// Answers "which events fall in `[since, until)`?".
#[derive(Debug)]
pub struct QueryService {
    cache: RangeCache,
}

impl QueryService {
    /// Creates a service over an explicit list of sources.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ServerError::Config`] if `config` is invalid.
    pub fn new(
        client: Arc<dyn CalendarClient>,
        sources: Vec<CalendarSource>,
        config: ServiceConfig,
    ) -> ServerResult<Self> {
        let aggregator = SourceAggregator::new(client, sources);
        Self::with_aggregator(aggregator, config)
    }

    /// Creates a service over every calendar the client lists.
    pub async fn discover(
        client: Arc<dyn CalendarClient>,
        config: ServiceConfig,
    ) -> ServerResult<Self> {
        config.validate()?;
        let aggregator = SourceAggregator::discover(client).await?;
        Self::with_aggregator(aggregator, config)
    }

    fn with_aggregator(aggregator: SourceAggregator, config: ServiceConfig) -> ServerResult<Self> {
        let capacity = config.validate()?;
        let aggregator = aggregator
            .with_normalizer(config.normalizer)
            .with_fetch_timeout(config.fetch_timeout);

        info!(
            sources = aggregator.sources().len(),
            cache_capacity = capacity.get(),
            fetch_timeout_ms = config.fetch_timeout.as_millis() as u64,
            anchor_zone = %config.normalizer.zone(),
            "Query service ready"
        );

        Ok(Self {
            cache: RangeCache::new(Arc::new(aggregator), capacity),
        })
    }

    /// Returns the events overlapping `[since, until)`.
    ///
    /// Source failures never surface here; the result then comes from the
    /// previous cache entry, or is empty.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ServerError::InvalidWindow`] if `since >= until` or a
    /// bound is out of range. The cache is left untouched in that case.
    #[tracing::instrument(skip(self), fields(events, origin))]
    pub async fn get_events(
        &self,
        since: i64,
        until: i64,
        force_reload: bool,
    ) -> ServerResult<Vec<EventRecord>> {
        let lookup = self.lookup(since, until, force_reload).await?;
        let records: Vec<EventRecord> = lookup.events().iter().map(EventRecord::from).collect();

        let span = tracing::Span::current();
        span.record("events", records.len());
        span.record("origin", lookup.as_str());

        Ok(records)
    }

    /// Like [`QueryService::get_events`], but returns the cached events
    /// together with where they came from.
    pub async fn lookup(&self, since: i64, until: i64, force_reload: bool) -> ServerResult<Lookup> {
        let started = Instant::now();
        let window = Window::new(since, until)?;
        let lookup = self.cache.get(window, force_reload).await;
        debug!(
            %window,
            force_reload,
            origin = lookup.as_str(),
            events = lookup.events().len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Window resolved"
        );
        Ok(lookup)
    }

    /// The deduplicated sources being queried.
    pub fn sources(&self) -> &[CalendarSource] {
        self.cache.aggregator().sources()
    }

    pub async fn stats(&self) -> CacheStats {
        self.cache.stats().await
    }
}
