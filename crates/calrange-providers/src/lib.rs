//! Calendar sources and their aggregation.
//!
//! - [`CalendarClient`] - the seam to whatever stores calendars
//! - [`SourceAggregator`] - fetches every source for a window and keeps the
//!   events that overlap it
//! - [`MemoryClient`] and [`FileClient`] - clients for tests, embedders and
//!   local fixtures
//!
//! ```text
//!  CalendarClient ──RawEvent──▶ SourceAggregator ──Event──▶ FetchReport
//!                                    │
//!                                    ├─ TimeNormalizer
//!                                    └─ overlap predicate
//! ```

pub mod aggregate;
pub mod client;
pub mod error;
pub mod fixture;
pub mod memory;
pub mod raw_event;

pub use aggregate::{DEFAULT_FETCH_TIMEOUT, FetchReport, SourceAggregator, SourceFailure};
pub use client::{BoxFuture, CalendarClient, CalendarSource, QueryRange, dedup_sources};
pub use error::{AggregateError, ProviderError, ProviderErrorCode, ProviderResult};
pub use fixture::FileClient;
pub use memory::MemoryClient;
pub use raw_event::{RawEvent, RawTimeSpan};
