//! Configuration validation.

use thiserror::Error;

use super::types::Config;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Validates cross-field constraints the type system cannot express.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.scheduler.workers == 0 {
        return Err(ConfigError::Invalid(
            "scheduler.workers must be at least 1".to_string(),
        ));
    }

    if config.scheduler.max_attempts == 0 {
        return Err(ConfigError::Invalid(
            "scheduler.max_attempts must be at least 1".to_string(),
        ));
    }

    if config.scheduler.job_timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "scheduler.job_timeout_secs must be positive".to_string(),
        ));
    }

    if config.limits.max_upload_bytes == 0 {
        return Err(ConfigError::Invalid(
            "limits.max_upload_bytes must be positive".to_string(),
        ));
    }

    if config.retention.enabled && config.retention.sweep_interval_secs == 0 {
        return Err(ConfigError::Invalid(
            "retention.sweep_interval_secs must be positive when retention is enabled"
                .to_string(),
        ));
    }

    if config.converter.jpeg_quality == 0 || config.converter.jpeg_quality > 100 {
        return Err(ConfigError::Invalid(
            "converter.jpeg_quality must be between 1 and 100".to_string(),
        ));
    }

    Ok(())
}
