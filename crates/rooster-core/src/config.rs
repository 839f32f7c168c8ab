use anyhow::{Context, Result};
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the local database
    pub data_dir: PathBuf,

    /// Local persistence settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Timetable behaviour (timezone, pruning, deferred work)
    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file name, relative to `data_dir`
    #[serde(default = "default_database_file")]
    pub database_file: String,
}

fn default_database_file() -> String {
    "rooster.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_file: default_database_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// IANA timezone the timetable is expressed in
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Appointments ending this many days before the loaded week are pruned
    #[serde(default = "default_prune_after_days")]
    pub prune_after_days: u32,

    /// Delay before the deferred prune and sync passes run
    #[serde(default = "default_deferred_delay_ms")]
    pub deferred_delay_ms: u64,

    /// Day the navigation window starts on before the user moves it
    #[serde(default = "default_initial_window")]
    pub initial_window: NaiveDate,
}

fn default_timezone() -> String {
    "Europe/Amsterdam".to_string()
}

fn default_prune_after_days() -> u32 {
    14
}

fn default_deferred_delay_ms() -> u64 {
    5000
}

fn default_initial_window() -> NaiveDate {
    NaiveDate::from_ymd_opt(2016, 9, 6).unwrap_or_default()
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            prune_after_days: default_prune_after_days(),
            deferred_delay_ms: default_deferred_delay_ms(),
            initial_window: default_initial_window(),
        }
    }
}

impl ScheduleConfig {
    /// Parse the configured timezone.
    ///
    /// # Errors
    /// Returns `ConfigError::UnknownTimezone` if the name is not a known IANA zone.
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::UnknownTimezone(self.timezone.clone()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive, overridden by RUST_LOG
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rooster");

        Self {
            data_dir,
            storage: StorageConfig::default(),
            schedule: ScheduleConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, writing defaults there if the file is missing
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.ensure_valid()?;
        Ok((config, validation))
    }

    /// Validate, failing on errors and logging warnings.
    pub fn ensure_valid(&self) -> Result<ValidationResult> {
        let validation = self.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok(validation)
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.storage.database_file.trim().is_empty() {
            result.add_error("storage.database_file", "Database file name cannot be empty");
        }

        if let Err(e) = self.schedule.timezone() {
            result.add_error("schedule.timezone", e.to_string());
        }

        if self.schedule.prune_after_days == 0 {
            result.add_error(
                "schedule.prune_after_days",
                "Prune window must be at least one day",
            );
        } else if self.schedule.prune_after_days > 365 {
            result.add_warning(
                "schedule.prune_after_days",
                "Prune window is longer than a year; local storage will grow",
            );
        }

        if self.schedule.deferred_delay_ms == 0 {
            result.add_warning(
                "schedule.deferred_delay_ms",
                "Deferred prune and sync run immediately (0 ms)",
            );
        }

        result
    }

    /// Full path of the SQLite database
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.storage.database_file)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("rooster");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_unknown_timezone() {
        let mut config = Config::default();
        config.schedule.timezone = "Mars/Olympus_Mons".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "schedule.timezone"));
    }

    #[test]
    fn test_zero_prune_days() {
        let mut config = Config::default();
        config.schedule.prune_after_days = 0;
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "schedule.prune_after_days"));
    }

    #[test]
    fn test_zero_delay_is_warning() {
        let mut config = Config::default();
        config.schedule.deferred_delay_ms = 0;
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "schedule.deferred_delay_ms"));
    }

    #[test]
    fn test_ensure_valid() {
        let mut config = Config::default();
        config.schedule.deferred_delay_ms = 0;
        assert_eq!(config.ensure_valid().unwrap().warnings.len(), 1);

        config.storage.database_file = " ".to_string();
        let err = config.ensure_valid().unwrap_err();
        assert!(err.to_string().contains("storage.database_file"));
    }

    #[test]
    fn test_default_timezone_parses() {
        let tz = ScheduleConfig::default().timezone().unwrap();
        assert_eq!(tz, chrono_tz::Europe::Amsterdam);
    }

    #[test]
    fn test_load_from_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.schedule.prune_after_days, 14);

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.schedule.initial_window, config.schedule.initial_window);
        assert_eq!(reloaded.storage.database_file, "rooster.db");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "data_dir = \"/tmp/rooster\"\n\n[schedule]\ntimezone = \"UTC\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.schedule.timezone, "UTC");
        assert_eq!(config.schedule.deferred_delay_ms, 5000);
        assert_eq!(config.database_path(), PathBuf::from("/tmp/rooster/rooster.db"));
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }
}
