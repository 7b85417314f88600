//! Validation helpers and parsing utilities for configuration values.

use std::path::PathBuf;

use crate::error::{ConfigError, ConfigResult};
use crate::model::EngineConfig;

const LOG_FORMATS: [&str; 2] = ["pretty", "json"];

/// Parse a strictly positive integer from an environment value.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the value is not a positive integer.
pub fn parse_positive_u64(field: &str, raw: &str) -> ConfigResult<u64> {
    let value = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::invalid(field, "must be an unsigned integer", Some(raw)))?;
    if value == 0 {
        return Err(ConfigError::invalid(field, "must be positive", Some(raw)));
    }
    Ok(value)
}

/// Parse a strictly positive `usize` from an environment value.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the value is not a positive integer
/// or does not fit the platform word size.
pub fn parse_positive_usize(field: &str, raw: &str) -> ConfigResult<usize> {
    let value = parse_positive_u64(field, raw)?;
    usize::try_from(value)
        .map_err(|_| ConfigError::invalid(field, "exceeds platform limits", Some(raw)))
}

/// Split an allow-list on commas and colons, dropping blanks.
#[must_use]
pub fn parse_path_list(raw: &str) -> Vec<PathBuf> {
    raw.split([',', ':'])
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Check cross-field invariants of a fully layered configuration.
///
/// # Errors
///
/// Returns the first [`ConfigError::InvalidField`] encountered.
pub fn validate(config: &EngineConfig) -> ConfigResult<()> {
    if config.log_level.trim().is_empty() {
        return Err(ConfigError::invalid("log_level", "must not be empty", None));
    }
    if let Some(format) = config.log_format.as_deref()
        && !LOG_FORMATS.contains(&format)
    {
        return Err(ConfigError::invalid(
            "log_format",
            "must be pretty or json",
            Some(format),
        ));
    }
    if config.job_ttl_secs == 0 {
        return Err(ConfigError::invalid("job_ttl_secs", "must be positive", None));
    }
    if config.lock_ttl_secs == 0 {
        return Err(ConfigError::invalid("lock_ttl_secs", "must be positive", None));
    }
    if config.event_capacity == 0 {
        return Err(ConfigError::invalid(
            "event_capacity",
            "must be positive",
            None,
        ));
    }
    if let Some(root) = config.allow_paths.iter().find(|root| !root.is_absolute()) {
        return Err(ConfigError::invalid(
            "allow_paths",
            "entries must be absolute paths",
            Some(&root.display().to_string()),
        ));
    }
    if config
        .overlay_command
        .as_deref()
        .is_some_and(|command| command.trim().is_empty())
    {
        return Err(ConfigError::invalid(
            "overlay_command",
            "must not be blank",
            None,
        ));
    }
    Ok(())
}
