use crate::core::error::{ProgressError, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const QUIET_ENV: &str = "PROGRESS_LOGGER_QUIET";
pub const INTERVAL_ENV: &str = "PROGRESS_LOGGER_INTERVAL_MS";

const DEFAULT_REFRESH_INTERVAL_MS: u64 = 10_000;

/// Display settings shared by the renderer and the render timer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// Suppress all output; trackers keep working
    #[serde(default)]
    pub quiet: bool,
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            quiet: false,
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
        }
    }
}

fn default_refresh_interval_ms() -> u64 {
    DEFAULT_REFRESH_INTERVAL_MS
}

impl LoggerConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn set_refresh_interval(&mut self, interval: Duration) -> Result<()> {
        validate_interval(interval)?;
        self.refresh_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        validate_interval(self.refresh_interval())
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Self::parse(content, Path::new("<string>"))
    }

    /// Applies `PROGRESS_LOGGER_QUIET` and `PROGRESS_LOGGER_INTERVAL_MS` from the environment
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(env::var(QUIET_ENV).ok(), env::var(INTERVAL_ENV).ok())
    }

    fn with_overrides(mut self, quiet: Option<String>, interval: Option<String>) -> Self {
        if let Some(value) = quiet {
            match parse_flag(&value) {
                Some(quiet) => self.quiet = quiet,
                None => warn!("Ignoring {QUIET_ENV}={value}: expected a boolean"),
            }
        }

        if let Some(value) = interval {
            match value.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => self.refresh_interval_ms = ms,
                _ => warn!("Ignoring {INTERVAL_ENV}={value}: expected a positive integer"),
            }
        }

        self
    }

    fn parse(content: &str, path: &Path) -> Result<Self> {
        let config: LoggerConfig =
            toml::from_str(content).map_err(|e| ProgressError::ConfigParse {
                path: path.to_path_buf(),
                message: e.message().to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }
}

fn validate_interval(interval: Duration) -> Result<()> {
    if interval.as_millis() == 0 {
        return Err(ProgressError::InvalidInterval(interval));
    }
    Ok(())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub struct ConfigService;

impl ConfigService {
    /// `<config dir>/progress-logger/config.toml`
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("progress-logger").join("config.toml"))
    }

    /// Reads the config at `path`. A missing file means defaults.
    pub fn load_config(path: &Path) -> Result<LoggerConfig> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(LoggerConfig::default());
            }
            Err(source) => {
                return Err(ProgressError::ConfigRead {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let config = LoggerConfig::parse(&content, path)?;
        info!("Loaded progress logger configuration from {}", path.display());
        Ok(config)
    }

    /// Default config file (if any) with environment overrides applied.
    /// Falls back to defaults when the file cannot be used.
    pub fn load_default() -> LoggerConfig {
        let config = match Self::default_config_path() {
            Some(path) => Self::load_config(&path).unwrap_or_else(|e| {
                warn!("{e}; using default configuration");
                LoggerConfig::default()
            }),
            None => LoggerConfig::default(),
        };
        config.with_env_overrides()
    }
}
