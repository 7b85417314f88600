//! Job records and their store keys.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

const JOB_PREFIX: &str = "job:";
const LOCK_PREFIX: &str = "lock:";

/// Operations that run as background jobs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Watermark every file of a folder with a name.
    Encrypt,
    /// Recover watermarks from a folder.
    Decrypt,
    /// Batch copy pipeline.
    Batch,
    /// Visible text on one photo.
    AddText,
    /// Strip binary watermarks.
    RemoveWatermarks,
    /// Archive a folder.
    Archive,
}

impl OperationKind {
    /// Label used in lock keys, metrics and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Encrypt => "encrypt",
            Self::Decrypt => "decrypt",
            Self::Batch => "batch",
            Self::AddText => "add_text",
            Self::RemoveWatermarks => "remove_watermarks",
            Self::Archive => "archive",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state; `Completed` and `Error` are final.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Worker still running.
    Processing,
    /// Worker returned a result.
    Completed,
    /// Worker failed or panicked.
    Error,
}

impl JobStatus {
    /// Label used in metrics and output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// Whether no further transition can happen.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// Full job record as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Job identifier.
    pub id: Uuid,
    /// Operation the job runs.
    pub operation: OperationKind,
    /// Source path the job works on.
    pub path: String,
    /// Current status.
    pub status: JobStatus,
    /// Completed fraction in `[0, 1]`.
    pub progress: f64,
    /// Error chain when the job failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Result payload when the job completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// When the job was accepted.
    pub start_time: DateTime<Utc>,
    /// When the job reached a final state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub(crate) fn new(id: Uuid, operation: OperationKind, path: String) -> Self {
        Self {
            id,
            operation,
            path,
            status: JobStatus::Processing,
            progress: 0.0,
            error: None,
            result: None,
            start_time: Utc::now(),
            finished_at: None,
        }
    }

    /// Condensed listing view.
    #[must_use]
    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id,
            operation: self.operation,
            status: self.status,
            progress: self.progress,
            start_time: self.start_time,
        }
    }
}

/// Listing row for admin views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    /// Job identifier.
    pub id: Uuid,
    /// Operation the job runs.
    pub operation: OperationKind,
    /// Current status.
    pub status: JobStatus,
    /// Completed fraction.
    pub progress: f64,
    /// When the job was accepted.
    pub start_time: DateTime<Utc>,
}

pub(crate) fn job_key(id: Uuid) -> String {
    format!("{JOB_PREFIX}{id}")
}

pub(crate) const fn job_prefix() -> &'static str {
    JOB_PREFIX
}

pub(crate) fn lock_key(operation: OperationKind, path: &str) -> String {
    format!("{LOCK_PREFIX}{}|{path}", operation.as_str())
}
