//! Layered configuration loading.
//!
//! # Design
//! - Defaults, then the optional JSON file named by `ENDECODE_CONFIG`, then
//!   individual `ENDECODE_*` variables; validation runs once on the result.
//! - Variable lookup is injectable so callers and tests never mutate the
//!   process environment.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::defaults::{
    ENV_ALLOW_PATHS, ENV_CONFIG_FILE, ENV_EVENT_CAPACITY, ENV_JOB_TTL_SECS, ENV_LOCK_TTL_SECS,
    ENV_LOG_FORMAT, ENV_LOG_LEVEL, ENV_OVERLAY_COMMAND,
};
use crate::error::{ConfigError, ConfigResult};
use crate::model::EngineConfig;
use crate::validate::{parse_path_list, parse_positive_u64, parse_positive_usize, validate};

/// Builds an [`EngineConfig`] from a variable lookup function.
pub struct ConfigLoader<F> {
    lookup: F,
}

impl ConfigLoader<fn(&str) -> Option<String>> {
    /// Loader reading the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            lookup: |key| std::env::var(key).ok(),
        }
    }
}

impl<F> ConfigLoader<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Loader reading variables through `lookup`.
    pub const fn with_lookup(lookup: F) -> Self {
        Self { lookup }
    }

    /// Resolve the layered configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration file cannot be read or parsed,
    /// or when any resulting field is invalid.
    pub fn load(&self) -> ConfigResult<EngineConfig> {
        let mut config = match self.var(ENV_CONFIG_FILE) {
            Some(path) => load_file(Path::new(&path))?,
            None => EngineConfig::default(),
        };
        self.apply_overrides(&mut config)?;
        validate(&config)?;
        debug!(
            log_level = %config.log_level,
            job_ttl_secs = config.job_ttl_secs,
            allow_paths = config.allow_paths.len(),
            overlay = config.overlay_command.is_some(),
            "configuration loaded"
        );
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut EngineConfig) -> ConfigResult<()> {
        if let Some(level) = self.var(ENV_LOG_LEVEL) {
            config.log_level = level;
        }
        if let Some(format) = self.var(ENV_LOG_FORMAT) {
            config.log_format = Some(format.to_ascii_lowercase());
        }
        if let Some(raw) = self.var(ENV_JOB_TTL_SECS) {
            config.job_ttl_secs = parse_positive_u64("job_ttl_secs", &raw)?;
        }
        if let Some(raw) = self.var(ENV_LOCK_TTL_SECS) {
            config.lock_ttl_secs = parse_positive_u64("lock_ttl_secs", &raw)?;
        }
        if let Some(raw) = self.var(ENV_EVENT_CAPACITY) {
            config.event_capacity = parse_positive_usize("event_capacity", &raw)?;
        }
        if let Some(raw) = self.var(ENV_ALLOW_PATHS) {
            config.allow_paths = parse_path_list(&raw);
        }
        if let Some(command) = self.var(ENV_OVERLAY_COMMAND) {
            config.overlay_command = Some(command);
        }
        Ok(())
    }

    /// Non-blank, trimmed variable value.
    fn var(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}

/// Parse a JSON configuration file; absent fields take their defaults.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] or [`ConfigError::Json`] on failure.
pub fn load_file(path: &Path) -> ConfigResult<EngineConfig> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        operation: "read",
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })
}
