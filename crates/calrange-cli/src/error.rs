//! CLI error types.

use thiserror::Error;

use calrange_core::TracingError;
use calrange_providers::ProviderError;
use calrange_server::ServerError;

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A `--since`/`--until` value could not be read as a time.
    #[error("invalid time {value:?}: expected Unix seconds, YYYY-MM-DD or RFC 3339")]
    InvalidTime { value: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Calendar source error.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Query service error.
    #[error(transparent)]
    Server(#[from] ServerError),

    /// Logging setup error.
    #[error("logging setup failed: {0}")]
    Tracing(#[from] TracingError),

    /// JSON output error.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
