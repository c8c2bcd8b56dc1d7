//! Range query service.
//!
//! This crate answers "which calendar events fall in `[since, until)`?":
//! - [`QueryService`] validates the window and projects cached events
//! - [`RangeCache`] keeps one entry per exact window in a bounded LRU map
//!   and coalesces concurrent rebuilds of the same window
//!
//! Transport is up to the embedder; [`calrange_core::EventRecord`] is
//! serde-serializable.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use calrange_providers::MemoryClient;
//! use calrange_server::{QueryService, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(MemoryClient::new());
//!     let service = QueryService::discover(client, ServiceConfig::default()).await?;
//!
//!     let events = service.get_events(1_704_240_000, 1_704_844_800, false).await?;
//!     println!("{} events", events.len());
//!     Ok(())
//! }
//! ```

mod cache;
mod config;
mod error;
mod service;

pub use cache::{CacheStats, Lookup, RangeCache};
pub use config::{DEFAULT_CACHE_CAPACITY, ServiceConfig};
pub use error::{ServerError, ServerResult};
pub use service::QueryService;
