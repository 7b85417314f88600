//! Error types for configuration operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Field contained an invalid value.
    #[error("invalid configuration field `{field}`: {reason}")]
    InvalidField {
        /// Field that failed validation.
        field: String,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// File system operation failed.
    #[error("failed to {operation} {}", path.display())]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
    /// Configuration file was not valid JSON for the model.
    #[error("failed to parse configuration file {}", path.display())]
    Json {
        /// File that failed to parse.
        path: PathBuf,
        /// Source serde error.
        source: serde_json::Error,
    },
}

/// Convenience result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

impl ConfigError {
    /// Build an [`ConfigError::InvalidField`] for the given field.
    #[must_use]
    pub fn invalid(field: impl Into<String>, reason: &'static str, value: Option<&str>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason,
            value: value.map(str::to_string),
        }
    }
}
