//! Default values and environment variable names.
//!
//! # Design
//! - Centralize defaults so the model, loader, and docs stay consistent.
//! - Keep time-based defaults explicit for auditability.

/// Default log level when neither the file nor the environment sets one.
pub const LOG_LEVEL: &str = "info";
/// Retention window for job records (seconds).
pub const JOB_TTL_SECS: u64 = 86_400;
/// Expiry of dedup locks left behind by a crashed worker (seconds).
pub const LOCK_TTL_SECS: u64 = 86_400;
/// Bounded subscriber buffer for job events.
pub const EVENT_CAPACITY: usize = 1_024;

/// Path to an optional JSON configuration file.
pub const ENV_CONFIG_FILE: &str = "ENDECODE_CONFIG";
/// Log level override.
pub const ENV_LOG_LEVEL: &str = "ENDECODE_LOG_LEVEL";
/// Log format override (`pretty` or `json`).
pub const ENV_LOG_FORMAT: &str = "ENDECODE_LOG_FORMAT";
/// Job retention override.
pub const ENV_JOB_TTL_SECS: &str = "ENDECODE_JOB_TTL_SECS";
/// Lock expiry override.
pub const ENV_LOCK_TTL_SECS: &str = "ENDECODE_LOCK_TTL_SECS";
/// Event buffer override.
pub const ENV_EVENT_CAPACITY: &str = "ENDECODE_EVENT_CAPACITY";
/// Comma or colon separated allow-list of source roots.
pub const ENV_ALLOW_PATHS: &str = "ENDECODE_ALLOW_PATHS";
/// External overlay renderer command.
pub const ENV_OVERLAY_COMMAND: &str = "ENDECODE_OVERLAY_COMMAND";
