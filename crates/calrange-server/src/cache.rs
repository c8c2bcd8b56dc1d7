//! Per-window event cache.
//!
//! [`RangeCache`] maps a [`Window`] (exact bounds, no containment) to the
//! events fetched for it. Entries live in a bounded LRU map and are only
//! replaced by a successful rebuild; a failed rebuild keeps serving the
//! previous entry.
//!
//! Rebuilds run on their own task. Requests for a window that is already
//! being rebuilt wait on that rebuild instead of starting another one.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tracing::{Instrument, debug, info, info_span, warn};

use calrange_core::{Event, Window};
use calrange_providers::SourceAggregator;

/// Result of a cache lookup, tagged with where the events came from.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Served from an existing entry without fetching.
    Hit(Arc<[Event]>),
    /// Freshly fetched and stored.
    Rebuilt(Arc<[Event]>),
    /// The rebuild failed; this is the previous entry, unchanged.
    Stale(Arc<[Event]>),
    /// The rebuild failed and there was nothing cached.
    Missing,
}

impl Lookup {
    /// The events of this lookup; empty for [`Lookup::Missing`].
    pub fn events(&self) -> &[Event] {
        match self {
            Self::Hit(events) | Self::Rebuilt(events) | Self::Stale(events) => events,
            Self::Missing => &[],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hit(_) => "hit",
            Self::Rebuilt(_) => "rebuilt",
            Self::Stale(_) => "stale",
            Self::Missing => "missing",
        }
    }
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub in_flight: usize,
    pub hits: u64,
    pub rebuilds: u64,
    /// Requests that joined a rebuild started by someone else.
    pub coalesced: u64,
    pub failed_rebuilds: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    rebuilds: AtomicU64,
    coalesced: AtomicU64,
    failed_rebuilds: AtomicU64,
}

type RebuildReceiver = watch::Receiver<Option<Lookup>>;

struct CacheState {
    entries: LruCache<Window, Arc<[Event]>>,
    in_flight: HashMap<Window, RebuildReceiver>,
}

/// Window-keyed event cache with single-flight rebuilds.
pub struct RangeCache {
    aggregator: Arc<SourceAggregator>,
    state: Arc<Mutex<CacheState>>,
    counters: Arc<Counters>,
}

impl std::fmt::Debug for RangeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeCache")
            .field("aggregator", &self.aggregator)
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}

impl RangeCache {
    /// Creates an empty cache holding at most `capacity` windows.
    pub fn new(aggregator: Arc<SourceAggregator>, capacity: NonZeroUsize) -> Self {
        Self {
            aggregator,
            state: Arc::new(Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                in_flight: HashMap::new(),
            })),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn aggregator(&self) -> &SourceAggregator {
        &self.aggregator
    }

    /// Returns the events for `window`.
    ///
    /// Without `force_reload` an existing entry is returned as is. Otherwise
    /// the window is rebuilt, or the caller joins a rebuild already running
    /// for it. Dropping the returned future does not cancel the rebuild.
    pub async fn get(&self, window: Window, force_reload: bool) -> Lookup {
        loop {
            let mut pending = {
                let mut state = self.state.lock().await;

                if !force_reload {
                    if let Some(events) = state.entries.get(&window) {
                        self.counters.hits.fetch_add(1, Ordering::Relaxed);
                        debug!(%window, events = events.len(), "Cache hit");
                        return Lookup::Hit(Arc::clone(events));
                    }
                }

                // A closed sender means the worker died before reporting.
                let running = state
                    .in_flight
                    .get(&window)
                    .filter(|rx| rx.has_changed().is_ok())
                    .cloned();
                match running {
                    Some(rx) => {
                        self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                        debug!(%window, "Joining in-flight rebuild");
                        rx
                    }
                    None => self.start_rebuild(&mut state, window),
                }
            };

            let outcome = pending
                .wait_for(Option::is_some)
                .await
                .ok()
                .and_then(|lookup| (*lookup).clone());

            match outcome {
                Some(lookup) => return lookup,
                None => warn!(%window, "Rebuild worker exited without a result, retrying"),
            }
        }
    }

    /// Returns true if `window` has an entry, without touching its recency.
    pub async fn contains(&self, window: &Window) -> bool {
        self.state.lock().await.entries.contains(window)
    }

    pub async fn stats(&self) -> CacheStats {
        let state = self.state.lock().await;
        CacheStats {
            entries: state.entries.len(),
            capacity: state.entries.cap().get(),
            in_flight: state.in_flight.len(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            rebuilds: self.counters.rebuilds.load(Ordering::Relaxed),
            coalesced: self.counters.coalesced.load(Ordering::Relaxed),
            failed_rebuilds: self.counters.failed_rebuilds.load(Ordering::Relaxed),
        }
    }

    /// Registers a rebuild of `window` and spawns its worker. Must be called
    /// with the state lock held.
    fn start_rebuild(&self, state: &mut CacheState, window: Window) -> RebuildReceiver {
        let (tx, rx) = watch::channel(None);
        state.in_flight.insert(window, rx.clone());

        let aggregator = Arc::clone(&self.aggregator);
        let shared = Arc::clone(&self.state);
        let counters = Arc::clone(&self.counters);
        tokio::spawn(
            rebuild(aggregator, shared, counters, window, tx)
                .instrument(info_span!("rebuild", %window)),
        );

        rx
    }
}

async fn rebuild(
    aggregator: Arc<SourceAggregator>,
    state: Arc<Mutex<CacheState>>,
    counters: Arc<Counters>,
    window: Window,
    tx: watch::Sender<Option<Lookup>>,
) {
    // A panicking client takes down only the fetch task; the rebuild still
    // reports a result so waiters are released.
    let fetch = tokio::spawn(async move { aggregator.fetch(window).await }.in_current_span());
    let outcome = match fetch.await {
        Ok(outcome) => outcome.map_err(|e| e.to_string()),
        Err(e) => Err(format!("fetch task failed: {}", e)),
    };

    let mut state = state.lock().await;
    let lookup = match outcome {
        Ok(report) => {
            let partial = report.is_partial();
            let events: Arc<[Event]> = report.events.into();
            if let Some((evicted, _)) = state.entries.push(window, Arc::clone(&events)) {
                if evicted != window {
                    debug!(%evicted, "Evicted least recently used window");
                }
            }
            counters.rebuilds.fetch_add(1, Ordering::Relaxed);
            info!(events = events.len(), partial, "Cache entry rebuilt");
            Lookup::Rebuilt(events)
        }
        Err(e) => {
            counters.failed_rebuilds.fetch_add(1, Ordering::Relaxed);
            match state.entries.get(&window) {
                Some(previous) => {
                    warn!(
                        error = %e,
                        events = previous.len(),
                        "Rebuild failed, serving previous entry"
                    );
                    Lookup::Stale(Arc::clone(previous))
                }
                None => {
                    warn!(error = %e, "Rebuild failed with nothing cached");
                    Lookup::Missing
                }
            }
        }
    };
    state.in_flight.remove(&window);
    drop(state);

    tx.send_replace(Some(lookup));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use calrange_core::TimeNormalizer;
    use calrange_providers::{
        BoxFuture, CalendarClient, CalendarSource, MemoryClient, ProviderResult, QueryRange,
        RawEvent,
    };
    use chrono::FixedOffset;
    use futures_util::future::join_all;

    const T: i64 = 1_704_240_000; // 2024-01-03T00:00:00Z
    const DAY: i64 = 86_400;

    fn window(days: i64) -> Window {
        Window::new(T, T + days * DAY).unwrap()
    }

    fn standup() -> RawEvent {
        RawEvent::new("standup", "Standup")
            .with_span("2024-01-03T09:00:00Z", "2024-01-03T09:15:00Z")
    }

    fn cache_with(client: Arc<MemoryClient>, capacity: usize) -> RangeCache {
        let aggregator = SourceAggregator::new(client.clone(), client.sources())
            .with_normalizer(TimeNormalizer::with_fixed_offset(
                FixedOffset::east_opt(0).unwrap(),
            ));
        RangeCache::new(Arc::new(aggregator), NonZeroUsize::new(capacity).unwrap())
    }

    struct PanickingClient;

    impl CalendarClient for PanickingClient {
        fn name(&self) -> &str {
            "panicking"
        }

        fn list_calendars(&self) -> BoxFuture<'_, ProviderResult<Vec<CalendarSource>>> {
            Box::pin(async { Ok(vec![CalendarSource::new("Work", "feed://work")]) })
        }

        fn query_events<'a>(
            &'a self,
            _source: &'a CalendarSource,
            _range: QueryRange,
        ) -> BoxFuture<'a, ProviderResult<Vec<RawEvent>>> {
            Box::pin(async { explode() })
        }
    }

    fn explode() -> ProviderResult<Vec<RawEvent>> {
        panic!("feed parser blew up")
    }

    fn panicking_cache() -> RangeCache {
        let sources = vec![CalendarSource::new("Work", "feed://work")];
        let aggregator = SourceAggregator::new(Arc::new(PanickingClient), sources);
        RangeCache::new(Arc::new(aggregator), NonZeroUsize::new(4).unwrap())
    }

    fn work_client() -> Arc<MemoryClient> {
        Arc::new(MemoryClient::new().with_calendar("Work", "feed://work", vec![standup()]))
    }

    mod lookups {
        use super::*;

        #[tokio::test]
        async fn second_lookup_is_a_hit() {
            let client = work_client();
            let cache = cache_with(client.clone(), 4);

            let first = cache.get(window(7), false).await;
            let second = cache.get(window(7), false).await;

            assert!(matches!(first, Lookup::Rebuilt(_)));
            assert!(matches!(second, Lookup::Hit(_)));
            assert_eq!(first.events(), second.events());
            assert_eq!(client.query_count("feed://work"), 1);
        }

        #[tokio::test]
        async fn force_reload_queries_every_source_once() {
            let client = Arc::new(
                MemoryClient::new()
                    .with_calendar("Work", "feed://work", vec![standup()])
                    .with_calendar("Home", "feed://home", vec![]),
            );
            let cache = cache_with(client.clone(), 4);

            cache.get(window(7), false).await;
            let before = client.total_queries();
            let reloaded = cache.get(window(7), true).await;

            assert!(matches!(reloaded, Lookup::Rebuilt(_)));
            assert_eq!(client.total_queries() - before, 2);
            assert_eq!(client.query_count("feed://work"), 2);
            assert_eq!(client.query_count("feed://home"), 2);
        }

        #[tokio::test]
        async fn force_reload_replaces_entry() {
            let client = work_client();
            let cache = cache_with(client.clone(), 4);

            cache.get(window(7), false).await;
            client.set_events("feed://work", vec![]);

            assert_eq!(cache.get(window(7), false).await.events().len(), 1);
            assert!(cache.get(window(7), true).await.events().is_empty());
            assert!(cache.get(window(7), false).await.events().is_empty());
        }

        #[tokio::test]
        async fn sub_window_is_a_distinct_entry() {
            let client = work_client();
            let cache = cache_with(client.clone(), 4);

            cache.get(window(7), false).await;
            let narrower = cache.get(window(1), false).await;

            assert!(matches!(narrower, Lookup::Rebuilt(_)));
            assert_eq!(client.query_count("feed://work"), 2);
            assert_eq!(cache.stats().await.entries, 2);
        }
    }

    mod failures {
        use super::*;

        #[tokio::test]
        async fn failed_rebuild_serves_previous_entry() {
            let client = work_client();
            let cache = cache_with(client.clone(), 4);

            let original = cache.get(window(7), false).await;
            client.fail_feed("feed://work");
            let reloaded = cache.get(window(7), true).await;

            assert!(matches!(reloaded, Lookup::Stale(_)));
            assert_eq!(reloaded.events(), original.events());
            assert_eq!(cache.stats().await.failed_rebuilds, 1);
        }

        #[tokio::test]
        async fn failed_first_build_is_missing_and_retried() {
            let client = work_client();
            client.fail_feed("feed://work");
            let cache = cache_with(client.clone(), 4);

            let lookup = cache.get(window(7), false).await;
            assert_eq!(lookup, Lookup::Missing);
            assert!(lookup.events().is_empty());
            assert!(!cache.contains(&window(7)).await);

            client.restore_feed("feed://work");
            let retried = cache.get(window(7), false).await;
            assert!(matches!(retried, Lookup::Rebuilt(_)));
            assert_eq!(client.query_count("feed://work"), 2);
        }

        #[tokio::test]
        async fn dead_rebuild_worker_is_replaced() {
            let client = work_client();
            let cache = cache_with(client.clone(), 4);

            {
                let (tx, rx) = watch::channel(None);
                drop(tx);
                cache.state.lock().await.in_flight.insert(window(7), rx);
            }

            let lookup = cache.get(window(7), false).await;
            assert!(matches!(lookup, Lookup::Rebuilt(_)));
            assert_eq!(cache.stats().await.in_flight, 0);
        }

        #[tokio::test]
        async fn panicking_client_is_a_failed_rebuild() {
            let cache = panicking_cache();

            let lookup = tokio::time::timeout(Duration::from_secs(5), cache.get(window(7), false))
                .await
                .unwrap();
            assert_eq!(lookup, Lookup::Missing);

            let stats = cache.stats().await;
            assert_eq!(stats.failed_rebuilds, 1);
            assert_eq!(stats.in_flight, 0);
            assert!(!cache.contains(&window(7)).await);
        }

        #[tokio::test]
        async fn panicking_client_keeps_previous_entry() {
            let cache = panicking_cache();
            let previous: Arc<[Event]> = Vec::new().into();
            cache
                .state
                .lock()
                .await
                .entries
                .push(window(7), Arc::clone(&previous));

            let lookup = tokio::time::timeout(Duration::from_secs(5), cache.get(window(7), true))
                .await
                .unwrap();
            assert_eq!(lookup, Lookup::Stale(previous));

            // the next request tries the source again
            cache.get(window(7), true).await;
            assert_eq!(cache.stats().await.failed_rebuilds, 2);
        }
    }

    mod single_flight {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn concurrent_requests_share_one_fetch() {
            let client = Arc::new(
                MemoryClient::new()
                    .with_calendar("Work", "feed://work", vec![standup()])
                    .with_latency("feed://work", Duration::from_millis(200)),
            );
            let cache = cache_with(client.clone(), 4);

            let lookups = join_all((0..5).map(|_| cache.get(window(7), false))).await;

            assert_eq!(client.query_count("feed://work"), 1);
            assert!(lookups.iter().all(|l| matches!(l, Lookup::Rebuilt(_))));
            let stats = cache.stats().await;
            assert_eq!(stats.rebuilds, 1);
            assert_eq!(stats.coalesced, 4);
        }

        #[tokio::test(start_paused = true)]
        async fn different_windows_rebuild_independently() {
            let client = Arc::new(
                MemoryClient::new()
                    .with_calendar("Work", "feed://work", vec![standup()])
                    .with_latency("feed://work", Duration::from_millis(200)),
            );
            let cache = cache_with(client.clone(), 4);

            let (a, b) = tokio::join!(cache.get(window(7), false), cache.get(window(1), false));

            assert!(matches!(a, Lookup::Rebuilt(_)));
            assert!(matches!(b, Lookup::Rebuilt(_)));
            assert_eq!(client.query_count("feed://work"), 2);
        }

        #[tokio::test(start_paused = true)]
        async fn dropped_request_does_not_cancel_rebuild() {
            let client = Arc::new(
                MemoryClient::new()
                    .with_calendar("Work", "feed://work", vec![standup()])
                    .with_latency("feed://work", Duration::from_millis(200)),
            );
            let cache = cache_with(client.clone(), 4);

            let abandoned =
                tokio::time::timeout(Duration::from_millis(10), cache.get(window(7), false)).await;
            assert!(abandoned.is_err());

            tokio::time::sleep(Duration::from_millis(500)).await;
            assert!(cache.contains(&window(7)).await);

            let lookup = cache.get(window(7), false).await;
            assert!(matches!(lookup, Lookup::Hit(_)));
            assert_eq!(client.query_count("feed://work"), 1);
        }
    }

    mod eviction {
        use super::*;

        #[tokio::test]
        async fn capacity_bounds_entries() {
            let client = work_client();
            let cache = cache_with(client.clone(), 2);

            for days in 1..=5 {
                cache.get(window(days), false).await;
            }

            let stats = cache.stats().await;
            assert_eq!(stats.entries, 2);
            assert_eq!(stats.capacity, 2);
        }

        #[tokio::test]
        async fn least_recently_used_goes_first() {
            let client = work_client();
            let cache = cache_with(client.clone(), 2);

            cache.get(window(1), false).await;
            cache.get(window(2), false).await;
            // touch window(1) so window(2) becomes the oldest
            cache.get(window(1), false).await;
            cache.get(window(3), false).await;

            assert!(cache.contains(&window(1)).await);
            assert!(!cache.contains(&window(2)).await);
            assert!(cache.contains(&window(3)).await);
        }
    }
}
