//! Configuration commands.

use std::path::Path;

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};

/// Dump the current configuration to stdout.
pub fn dump(config: &CliConfig, path: Option<&Path>) -> CliResult<()> {
    let toml_str = toml::to_string_pretty(config)
        .map_err(|e| CliError::config(format!("failed to serialize config: {}", e)))?;
    let shown = path.map_or_else(CliConfig::default_path, Path::to_path_buf);
    println!("# config.toml ({})", shown.display());
    println!("{}", toml_str);

    Ok(())
}

/// Validate the configuration.
pub fn validate(config: &CliConfig, fixture: Option<&Path>) -> CliResult<()> {
    config.service_config()?;
    config.tracing_config(false)?;

    match config.fixture_path(fixture) {
        Ok(path) if !path.exists() => {
            return Err(CliError::config(format!(
                "fixture {} does not exist",
                path.display()
            )));
        }
        Ok(path) => println!("Calendar fixture: {}", path.display()),
        Err(_) => println!("No calendar fixture configured."),
    }

    println!("Configuration is valid.");
    Ok(())
}

/// Show the configuration file path.
pub fn path(path: Option<&Path>) -> CliResult<()> {
    let config_path = path.map_or_else(CliConfig::default_path, Path::to_path_buf);
    println!("config: {}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_defaults() {
        assert!(validate(&CliConfig::default(), None).is_ok());
    }

    #[test]
    fn validate_rejects_missing_fixture() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("calendars.json");
        let err = validate(&CliConfig::default(), Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn validate_rejects_bad_logging() {
        let mut config = CliConfig::default();
        config.logging.format = "xml".to_string();
        assert!(validate(&config, None).is_err());
    }
}
