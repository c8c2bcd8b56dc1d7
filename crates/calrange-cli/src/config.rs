//! CLI configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/calrange/config.toml` by default:
//!
//! ```toml
//! [cache]
//! capacity = 64
//!
//! [fetch]
//! timeout_secs = 30
//!
//! [source]
//! fixture = "/home/me/calendars.json"
//!
//! [time]
//! anchor = "local"   # or a fixed offset such as "+02:00"
//!
//! [logging]
//! level = "warn"
//! format = "compact"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use calrange_core::{TimeNormalizer, TracingConfig, TracingOutputFormat, parse_level};
use calrange_server::{DEFAULT_CACHE_CAPACITY, ServiceConfig};

use crate::error::{CliError, CliResult};

/// Configuration for the calrange CLI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub cache: CacheSettings,
    pub fetch: FetchSettings,
    pub source: SourceSettings,
    pub time: TimeSettings,
    pub logging: LoggingSettings,
}

/// Cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Maximum number of cached windows.
    pub capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Source query settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Per-source timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// JSON fixture file holding the calendars.
    pub fixture: Option<PathBuf>,
}

/// Where all-day dates are anchored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeSettings {
    /// `local`, or a fixed UTC offset like `+02:00`.
    pub anchor: String,
}

impl Default for TimeSettings {
    fn default() -> Self {
        Self {
            anchor: "local".to_string(),
        }
    }
}

/// Logging settings. `RUST_LOG` still takes precedence over `level`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    /// `pretty`, `compact` or `json`.
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl CliConfig {
    /// Loads the configuration.
    ///
    /// An explicit path must exist. Without one, the default path is used
    /// when present and built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CliError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| CliError::config(format!("failed to parse {}: {}", path.display(), e)))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calrange")
    }

    /// The all-day anchor as a normalizer.
    pub fn normalizer(&self) -> CliResult<TimeNormalizer> {
        let anchor = self.time.anchor.trim();
        if anchor.eq_ignore_ascii_case("local") {
            return Ok(TimeNormalizer::new());
        }
        anchor
            .parse::<FixedOffset>()
            .map(TimeNormalizer::with_fixed_offset)
            .map_err(|_| {
                CliError::config(format!(
                    "[time] anchor must be \"local\" or an offset like \"+02:00\", got {:?}",
                    self.time.anchor
                ))
            })
    }

    /// Builds and validates the query service configuration.
    pub fn service_config(&self) -> CliResult<ServiceConfig> {
        let config = ServiceConfig::new()
            .with_cache_capacity(self.cache.capacity)
            .with_fetch_timeout(Duration::from_secs(self.fetch.timeout_secs))
            .with_normalizer(self.normalizer()?);
        config.validate()?;
        Ok(config)
    }

    /// Builds the tracing configuration; `debug` selects the CLI debug preset.
    pub fn tracing_config(&self, debug: bool) -> CliResult<TracingConfig> {
        if debug {
            return Ok(TracingConfig::cli_debug());
        }
        let level = parse_level(&self.logging.level)?;
        let format: TracingOutputFormat = self.logging.format.parse()?;
        Ok(TracingConfig::default()
            .with_level(level)
            .with_format(format))
    }

    /// The fixture to read, preferring `override_path` over `[source] fixture`.
    pub fn fixture_path(&self, override_path: Option<&Path>) -> CliResult<PathBuf> {
        override_path
            .map(Path::to_path_buf)
            .or_else(|| self.source.fixture.clone())
            .ok_or_else(|| {
                CliError::config(format!(
                    "no calendar source configured; set [source] fixture in {} or pass --fixture",
                    Self::default_path().display()
                ))
            })
    }
}
