//! Service configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

use calrange_core::TimeNormalizer;
use calrange_providers::DEFAULT_FETCH_TIMEOUT;

use crate::error::{ServerError, ServerResult};

/// Default number of cached windows.
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

/// Query service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Maximum number of windows kept in the cache.
    pub cache_capacity: usize,

    /// Per-source query timeout.
    pub fetch_timeout: Duration,

    /// Zone used to anchor all-day dates.
    pub normalizer: TimeNormalizer,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            normalizer: TimeNormalizer::default(),
        }
    }
}

impl ServiceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set cache capacity.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Builder: set per-source fetch timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Builder: set the all-day anchor zone.
    pub fn with_normalizer(mut self, normalizer: TimeNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Checks the configuration, returning the cache capacity.
    pub fn validate(&self) -> ServerResult<NonZeroUsize> {
        if self.fetch_timeout.is_zero() {
            return Err(ServerError::config("fetch timeout must be greater than zero"));
        }
        NonZeroUsize::new(self.cache_capacity)
            .ok_or_else(|| ServerError::config("cache capacity must be greater than zero"))
    }
}
