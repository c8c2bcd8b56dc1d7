//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// calrange - calendar events for a time window
#[derive(Debug, Parser)]
#[command(name = "calrange")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "CALRANGE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// JSON fixture file to read calendars from (overrides `[source] fixture`)
    #[arg(long, env = "CALRANGE_FIXTURE", global = true)]
    pub fixture: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the calendars that would be queried
    Calendars {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show the events overlapping a time window
    Query(QueryArgs),

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Arguments of `calrange query`.
///
/// Times accept Unix seconds, `YYYY-MM-DD` (midnight in the configured
/// zone) or RFC 3339.
#[derive(Debug, Clone, Args)]
pub struct QueryArgs {
    /// Start of the window (inclusive)
    #[arg(long)]
    pub since: String,

    /// End of the window (exclusive)
    #[arg(long)]
    pub until: String,

    /// Refetch the window even if it is cached
    #[arg(long)]
    pub force_reload: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Print cache statistics to stderr after the query
    #[arg(long)]
    pub stats: bool,
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_query() {
        let cli = Cli::parse_from([
            "calrange",
            "query",
            "--since",
            "2024-01-03",
            "--until",
            "1704844800",
            "--force-reload",
            "--json",
        ]);

        let Command::Query(args) = cli.command else {
            panic!("expected query command");
        };
        assert_eq!(args.since, "2024-01-03");
        assert_eq!(args.until, "1704844800");
        assert!(args.force_reload);
        assert!(args.json);
        assert!(!args.stats);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "calrange",
            "calendars",
            "--fixture",
            "/tmp/cal.json",
            "-v",
        ]);
        assert!(cli.debug);
        assert_eq!(cli.fixture, Some(PathBuf::from("/tmp/cal.json")));
        assert!(matches!(cli.command, Command::Calendars { json: false }));
    }

    #[test]
    fn query_requires_bounds() {
        assert!(Cli::try_parse_from(["calrange", "query", "--since", "0"]).is_err());
    }

    #[test]
    fn config_actions() {
        let cli = Cli::parse_from(["calrange", "config", "validate"]);
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigAction::Validate
            }
        ));
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
