//! Error types for job tracking.

use thiserror::Error;
use uuid::Uuid;

/// Result alias for key-value store calls.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result alias for registry calls.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Failures reported by a key-value store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not serve the request.
    #[error("store failed to {operation} key {key}: {detail}")]
    Backend {
        /// Store operation that failed.
        operation: &'static str,
        /// Key involved.
        key: String,
        /// Backend-specific detail.
        detail: String,
    },
}

/// Errors produced by the job registry.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The backing store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A job record could not be serialised.
    #[error("failed to encode job {job_id}")]
    Encode {
        /// Job being written.
        job_id: Uuid,
        /// Serialisation error.
        source: serde_json::Error,
    },
    /// A stored record could not be parsed.
    #[error("failed to decode record at {key}")]
    Decode {
        /// Key holding the malformed record.
        key: String,
        /// Parse error.
        source: serde_json::Error,
    },
    /// A lock entry held something other than a job id.
    #[error("lock {key} holds malformed owner {value}")]
    MalformedLock {
        /// Lock key.
        key: String,
        /// Stored value.
        value: String,
    },
    /// Jobs can only be started from inside a Tokio runtime.
    #[error("no async runtime available to run job workers")]
    NoRuntime,
}
