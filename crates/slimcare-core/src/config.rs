//! Clinic configuration.
//!
//! Loaded from TOML; every section has defaults so an empty file is valid.
//! `SLIMCARE_DB_PATH` and `SLIMCARE_LOG_LEVEL` override the file.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rewards::RewardTable;
use crate::schedule::{ScheduleRule, UPCOMING_WINDOW_DAYS};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration validation failed: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ClinicConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub schedule: ScheduleConfig,
    pub rewards: RewardsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "slimcare.db".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Doses generated at enrollment and on reactivation
    pub dose_count: u32,
    /// Days between doses
    pub cadence_days: u32,
    /// Dashboard look-ahead window
    pub upcoming_window_days: i64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        let rule = ScheduleRule::default();
        Self {
            dose_count: rule.dose_count,
            cadence_days: rule.cadence_days,
            upcoming_window_days: UPCOMING_WINDOW_DAYS,
        }
    }
}

impl ScheduleConfig {
    pub fn rule(&self) -> ScheduleRule {
        ScheduleRule {
            dose_count: self.dose_count,
            cadence_days: self.cadence_days,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RewardsConfig {
    /// Points credited for each administered dose
    pub points_per_dose: u32,
    pub tiers: RewardTable,
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            points_per_dose: 10,
            tiers: RewardTable::default(),
        }
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl ClinicConfig {
    /// Parse from a TOML string and validate.
    pub fn from_toml_str(contents: &str) -> ConfigResult<Self> {
        let config: ClinicConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.schedule.cadence_days == 0 {
            return Err(ConfigError::Invalid("schedule.cadence_days must be at least 1".into()));
        }
        if self.schedule.dose_count == 0 {
            return Err(ConfigError::Invalid("schedule.dose_count must be at least 1".into()));
        }
        if self.schedule.upcoming_window_days < 0 {
            return Err(ConfigError::Invalid(
                "schedule.upcoming_window_days cannot be negative".into(),
            ));
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "logging.level must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.logging.level
            )));
        }
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::Invalid("database.path cannot be empty".into()));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("SLIMCARE_DB_PATH") {
            self.database.path = path;
        }
        if let Ok(level) = std::env::var("SLIMCARE_LOG_LEVEL") {
            self.logging.level = level;
        }
    }
}

/// Load configuration from a TOML file, then apply environment overrides.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<ClinicConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let mut config: ClinicConfig = toml::from_str(&contents)?;
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ClinicConfig::from_toml_str("").unwrap();
        assert_eq!(config, ClinicConfig::default());
        assert_eq!(config.schedule.rule(), ScheduleRule::default());
        assert_eq!(config.rewards.points_per_dose, 10);
    }

    #[test]
    fn test_parse_sections() {
        let config = ClinicConfig::from_toml_str(
            r#"
            [schedule]
            dose_count = 8
            cadence_days = 14

            [rewards]
            points_per_dose = 25

            [[rewards.tiers]]
            label = "Bronze"
            threshold = 200
            discount_value = 20.0

            [[rewards.tiers]]
            label = "Gold"
            threshold = 600
            discount_value = 70.0
            "#,
        )
        .unwrap();

        assert_eq!(config.schedule.rule(), ScheduleRule { dose_count: 8, cadence_days: 14 });
        assert_eq!(config.schedule.upcoming_window_days, 7);
        assert_eq!(config.rewards.points_per_dose, 25);
        assert_eq!(config.rewards.tiers.get_highest_reward(650).unwrap().label, "Gold");
    }

    #[test]
    fn test_rejects_zero_cadence() {
        let err = ClinicConfig::from_toml_str("[schedule]\ncadence_days = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_unordered_tiers() {
        let result = ClinicConfig::from_toml_str(
            r#"
            [[rewards.tiers]]
            label = "B"
            threshold = 300
            discount_value = 30.0

            [[rewards.tiers]]
            label = "A"
            threshold = 100
            discount_value = 10.0
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nlevel = \"debug\"").unwrap();

        let config = load_config(file.path()).unwrap();
        if std::env::var("SLIMCARE_LOG_LEVEL").is_err() {
            assert_eq!(config.logging.level, "debug");
        }
    }

    #[test]
    fn test_missing_file() {
        let err = load_config("/nonexistent/slimcare.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
