//! Typed configuration model.
//!
//! # Design
//! - Pure data carrier; IO lives in `loader.rs`, checks in `validate.rs`.
//! - Every field has a default so partial JSON files deserialize.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;

/// Engine-wide settings shared by the runtime and command surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Log level string (`info`, `debug`, or a full filter directive).
    pub log_level: String,
    /// Log format (`pretty` or `json`); inferred from the build when absent.
    pub log_format: Option<String>,
    /// Retention window for job records, in seconds.
    pub job_ttl_secs: u64,
    /// Expiry of dedup locks, in seconds.
    pub lock_ttl_secs: u64,
    /// Bounded buffer size for job event subscribers.
    pub event_capacity: usize,
    /// Source roots jobs may operate under; empty allows any path.
    pub allow_paths: Vec<PathBuf>,
    /// External program implementing the overlay renderer.
    pub overlay_command: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: defaults::LOG_LEVEL.to_string(),
            log_format: None,
            job_ttl_secs: defaults::JOB_TTL_SECS,
            lock_ttl_secs: defaults::LOCK_TTL_SECS,
            event_capacity: defaults::EVENT_CAPACITY,
            allow_paths: Vec::new(),
            overlay_command: None,
        }
    }
}

impl EngineConfig {
    /// Job retention window.
    #[must_use]
    pub const fn job_ttl(&self) -> Duration {
        Duration::from_secs(self.job_ttl_secs)
    }

    /// Dedup lock expiry.
    #[must_use]
    pub const fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }

    /// Whether `path` lies under one of the configured roots.
    ///
    /// An empty allow-list permits every path. Comparison is component-wise,
    /// so `/data/photos-old` is not under `/data/photos`.
    #[must_use]
    pub fn is_path_allowed(&self, path: &Path) -> bool {
        self.allow_paths.is_empty() || self.allow_paths.iter().any(|root| path.starts_with(root))
    }
}
