//! calrange CLI entry point.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::debug;

use calrange_cli::cli::{Cli, Command, ConfigAction};
use calrange_cli::commands;
use calrange_cli::config::CliConfig;
use calrange_cli::error::CliResult;
use calrange_core::init_tracing;
use calrange_providers::FileClient;
use calrange_server::QueryService;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let config = CliConfig::load(cli.config.as_deref())?;
    init_tracing(config.tracing_config(cli.debug)?)?;
    debug!(config = ?cli.config, "Configuration loaded");

    let fixture = cli.fixture.as_deref();
    match cli.command {
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config, cli.config.as_deref()),
            ConfigAction::Validate => commands::config::validate(&config, fixture),
            ConfigAction::Path => commands::config::path(cli.config.as_deref()),
        },
        Command::Calendars { json } => {
            let client = Arc::new(FileClient::new(config.fixture_path(fixture)?));
            commands::calendars::run(client, json).await
        }
        Command::Query(args) => {
            let client = Arc::new(FileClient::new(config.fixture_path(fixture)?));
            let service = QueryService::discover(client, config.service_config()?).await?;
            commands::query::run(&service, &args, &config.normalizer()?).await
        }
    }
}
