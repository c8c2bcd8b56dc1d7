//! calrange command-line interface.
//!
//! Runs range queries against a local calendar fixture through the same
//! [`calrange_server::QueryService`] an embedder would use.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use cli::Cli;
pub use config::CliConfig;
pub use error::{CliError, CliResult};
