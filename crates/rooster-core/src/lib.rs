//! Shared configuration, errors and logging setup for Rooster.

pub mod config;
pub mod error;

pub use config::{
    Config, ConfigValidationError, LoggingConfig, ScheduleConfig, StorageConfig, ValidationResult,
};
pub use error::{ConfigError, DatabaseError, RusqliteErrorExt};

use anyhow::Result;

/// Initialize logging with the default `info` filter.
pub fn init() -> Result<()> {
    init_with_filter(&LoggingConfig::default().filter)
}

/// Initialize logging. RUST_LOG takes precedence over `default_filter`.
///
/// # Errors
/// Fails if a global subscriber is already installed.
pub fn init_with_filter(default_filter: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::info!("Rooster logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails() {
        assert!(init_with_filter("debug").is_ok());
        assert!(init().is_err());
    }
}
