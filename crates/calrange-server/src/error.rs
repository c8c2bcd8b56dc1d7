//! Server error types.

use thiserror::Error;

use calrange_core::WindowError;
use calrange_providers::ProviderError;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors returned by the query service.
///
/// Source failures never show up here: they are absorbed by the cache,
/// which falls back to the previous entry or an empty result.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The requested window is empty, reversed or out of range.
    #[error("Invalid window: {0}")]
    InvalidWindow(#[from] WindowError),

    /// The calendar list could not be retrieved at startup.
    #[error("Calendar discovery failed: {0}")]
    Discovery(#[from] ProviderError),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl ServerError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
