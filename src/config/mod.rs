//! Configuration management for the showrunner engine
//!
//! Configuration comes from `SHOWRUNNER_*` environment variables or a TOML file.
//! The engine section doubles as the fallback for users without stored preferences.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::scheduler::duration::DEFAULT_SLOT_DURATION_MINUTES;
use crate::scheduler::request::UserPreferences;
use crate::scheduler::rotation::{RerunFrequency, RotationStrategy, DEFAULT_BINGE_RUN_LENGTH};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Engine defaults
    #[serde(default)]
    pub engine: EngineConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Engine-level defaults and limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Slot length when neither request, preferences nor catalog say otherwise
    pub default_slot_duration_minutes: u32,

    /// Shows prefetched concurrently before allocation
    pub prefetch_concurrency: usize,

    pub default_max_per_slot: usize,

    pub default_reruns_enabled: bool,

    pub default_rerun_frequency: RerunFrequency,

    pub default_strategy: RotationStrategy,

    /// Picks per turn under `round_robin_double`
    pub binge_run_length: usize,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = EngineConfig::default();

        let engine = EngineConfig {
            default_slot_duration_minutes: env_parse("SHOWRUNNER_SLOT_DURATION")
                .unwrap_or(defaults.default_slot_duration_minutes),
            prefetch_concurrency: env_parse("SHOWRUNNER_PREFETCH_CONCURRENCY")
                .unwrap_or(defaults.prefetch_concurrency),
            default_max_per_slot: env_parse("SHOWRUNNER_MAX_PER_SLOT").unwrap_or(defaults.default_max_per_slot),
            default_reruns_enabled: env_parse("SHOWRUNNER_RERUNS_ENABLED")
                .unwrap_or(defaults.default_reruns_enabled),
            default_rerun_frequency: env_parse("SHOWRUNNER_RERUN_FREQUENCY")
                .unwrap_or(defaults.default_rerun_frequency),
            default_strategy: env_parse("SHOWRUNNER_STRATEGY").unwrap_or(defaults.default_strategy),
            binge_run_length: env_parse("SHOWRUNNER_BINGE_RUN_LENGTH").unwrap_or(defaults.binge_run_length),
        };

        let sqlite_path = std::env::var("SHOWRUNNER_SQLITE_PATH")
            .unwrap_or_else(|_| String::from("data/showrunner.db"))
            .into();

        let level = std::env::var("SHOWRUNNER_LOG_LEVEL").unwrap_or_else(|_| String::from("info"));

        let format = std::env::var("SHOWRUNNER_LOG_FORMAT").unwrap_or_else(|_| String::from("text"));

        Ok(Self {
            engine,
            database: DatabaseConfig { sqlite_path },
            logging: LoggingConfig { level, format },
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.engine.default_slot_duration_minutes == 0 {
            anyhow::bail!("default_slot_duration_minutes must be greater than 0");
        }

        if self.engine.prefetch_concurrency == 0 {
            anyhow::bail!("prefetch_concurrency must be greater than 0");
        }

        if self.engine.default_max_per_slot == 0 {
            anyhow::bail!("default_max_per_slot must be greater than 0");
        }

        if self.engine.binge_run_length == 0 {
            anyhow::bail!("binge_run_length must be greater than 0");
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("log format must be 'text' or 'json', got '{}'", self.logging.format);
        }

        Ok(())
    }
}

impl EngineConfig {
    /// Preferences for a user who never stored any
    pub fn default_preferences(&self) -> UserPreferences {
        UserPreferences {
            reruns_enabled: self.default_reruns_enabled,
            rerun_frequency: self.default_rerun_frequency,
            slot_duration_minutes: None,
            max_concurrent_shows: self.default_max_per_slot,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_slot_duration_minutes: DEFAULT_SLOT_DURATION_MINUTES,
            prefetch_concurrency: 4,
            default_max_per_slot: 1,
            default_reruns_enabled: false,
            default_rerun_frequency: RerunFrequency::Medium,
            default_strategy: RotationStrategy::RoundRobin,
            binge_run_length: DEFAULT_BINGE_RUN_LENGTH,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/showrunner.db"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine.default_slot_duration_minutes, 30);
        assert_eq!(config.engine.prefetch_concurrency, 4);
    }

    #[test]
    fn test_invalid_prefetch_concurrency() {
        let mut config = Config::default();
        config.engine.prefetch_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = String::from("xml");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [engine]
            default_strategy = "random"
            default_reruns_enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.default_strategy, RotationStrategy::Random);
        assert!(config.engine.default_reruns_enabled);
        assert_eq!(config.engine.prefetch_concurrency, 4);
        assert_eq!(config.logging.format, "text");
    }

    #[test]
    fn test_default_preferences_follow_engine() {
        let engine = EngineConfig {
            default_reruns_enabled: true,
            default_max_per_slot: 2,
            ..Default::default()
        };
        let prefs = engine.default_preferences();
        assert!(prefs.reruns_enabled);
        assert_eq!(prefs.max_concurrent_shows, 2);
        assert_eq!(prefs.slot_duration_minutes, None);
    }
}
