//! Command handlers.

pub mod calendars;
pub mod config;
pub mod query;
