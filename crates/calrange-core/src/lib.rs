//! Core types: time normalization, query windows, events

pub mod event;
pub mod time;
pub mod tracing;
pub mod window;

pub use event::{Event, EventRecord};
pub use time::{AnchorZone, NormalizedTime, ParsedTime, TimeError, TimeNormalizer};
pub use self::tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing, parse_level};
pub use window::{Window, WindowError, overlaps};
