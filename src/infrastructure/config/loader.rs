//! Hierarchical configuration loading for a swarm coordination process.
//!
//! Precedence (lowest to highest):
//! 1. Programmatic defaults (`Config::default()`)
//! 2. `.swarm/config.yaml` (project config)
//! 3. `.swarm/local.yaml` (project-local overrides, optional)
//! 4. Environment variables (`SWARM_` prefix, `__`-delimited for nesting)

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Errors raised by [`ConfigLoader::validate`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("board root path must not be empty")]
    EmptyBoardRoot,

    #[error("bus history_size must be at least 1, got {0}")]
    InvalidHistorySize(usize),

    #[error("bridge throttle_ms must be at least 1, got {0}")]
    InvalidThrottle(u64),

    #[error("bridge max_events must be at least 1, got {0}")]
    InvalidMaxEvents(usize),

    #[error("consensus default_threshold must be in [0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),
}

/// Loads and validates a [`Config`] from defaults, project YAML, and the
/// environment.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging from the project's
    /// `.swarm/` directory and the environment.
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".swarm/config.yaml"))
            .merge(Yaml::file(".swarm/local.yaml"))
            .merge(Env::prefixed("SWARM_").split("__"))
            .extract()
            .context("failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, skipping the project
    /// `.swarm/` lookup. Used by the CLI's `--config` flag.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("SWARM_").split("__"))
            .extract()
            .with_context(|| format!("failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate a loaded configuration's invariants.
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.board.root.as_os_str().is_empty() {
            return Err(ConfigError::EmptyBoardRoot);
        }

        if config.bus.history_size == 0 {
            return Err(ConfigError::InvalidHistorySize(config.bus.history_size));
        }

        if config.bridge.throttle_ms == 0 {
            return Err(ConfigError::InvalidThrottle(config.bridge.throttle_ms));
        }

        if config.bridge.max_events == 0 {
            return Err(ConfigError::InvalidMaxEvents(config.bridge.max_events));
        }

        if !(0.0..=1.0).contains(&config.consensus.default_threshold) {
            return Err(ConfigError::InvalidThreshold(config.consensus.default_threshold));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.bus.history_size, 100);
        assert_eq!(config.bridge.throttle_ms, 100);
        assert_eq!(config.bridge.max_events, 10);
        assert!((config.consensus.default_threshold - 0.6).abs() < f64::EPSILON);
        ConfigLoader::validate(&config).expect("default config should be valid");
    }

    #[test]
    fn yaml_overrides_merge_over_defaults() {
        let yaml = "bus:\n  history_size: 250\nconsensus:\n  default_threshold: 0.75\n";
        let config: Config = serde_yaml::from_str(yaml).expect("yaml should parse");
        assert_eq!(config.bus.history_size, 250);
        assert!((config.consensus.default_threshold - 0.75).abs() < f64::EPSILON);
        // Fields absent from the override keep their defaults.
        assert_eq!(config.bridge.throttle_ms, 100);
        ConfigLoader::validate(&config).expect("overridden config should still be valid");
    }

    #[test]
    fn zero_history_size_is_rejected() {
        let mut config = Config::default();
        config.bus.history_size = 0;
        let err = ConfigLoader::validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidHistorySize(0)));
    }

    #[test]
    fn threshold_outside_unit_interval_is_rejected() {
        let mut config = Config::default();
        config.consensus.default_threshold = 1.5;
        let err = ConfigLoader::validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidThreshold(_)));
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        let err = ConfigLoader::validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLogLevel(level) if level == "verbose"));
    }

    #[test]
    fn load_from_file_merges_project_file_over_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "bridge:\n  throttle_ms: 250\n  max_events: 25").unwrap();
        file.flush().unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.bridge.throttle_ms, 250);
        assert_eq!(config.bridge.max_events, 25);
        // Untouched sections keep their defaults.
        assert_eq!(config.bus.history_size, 100);
    }

    #[test]
    fn env_vars_override_file_and_defaults() {
        figment::Jail::expect_with(|jail| {
            let path = jail.directory().join("local.yaml");
            std::fs::write(&path, "bus:\n  history_size: 50\n").unwrap();

            jail.set_env("SWARM_BUS__HISTORY_SIZE", "999");

            let config = ConfigLoader::load_from_file(&path).unwrap();
            assert_eq!(config.bus.history_size, 999);
            Ok(())
        });
    }
}
