//! Event payload types carried across the engine.

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// Identifier assigned to each event emitted by the engine.
pub type EventId = u64;

/// Default number of events buffered per subscriber.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1_024;

/// Typed job lifecycle events surfaced to subscribers.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A job was accepted and its worker spawned.
    JobStarted {
        /// Identifier of the job.
        job_id: Uuid,
        /// Operation kind label (`batch`, `encrypt`, ...).
        operation: String,
        /// Source path the job operates on.
        path: String,
    },
    /// A start request collapsed onto an already running job.
    JobDeduplicated {
        /// Identifier of the job that already owns the operation lock.
        job_id: Uuid,
        /// Operation kind label.
        operation: String,
        /// Source path of the duplicate request.
        path: String,
    },
    /// Worker reported progress.
    JobProgress {
        /// Identifier of the job.
        job_id: Uuid,
        /// Fraction of work completed, in `[0, 1]`.
        progress: f64,
    },
    /// Job finished successfully.
    JobCompleted {
        /// Identifier of the job.
        job_id: Uuid,
        /// Result payload recorded on the job.
        result: Option<Value>,
    },
    /// Job failed or its worker panicked.
    JobFailed {
        /// Identifier of the job.
        job_id: Uuid,
        /// Human-readable error detail describing the failure.
        message: String,
    },
}

impl Event {
    /// Machine-friendly discriminator for subscribers.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::JobStarted { .. } => "job_started",
            Self::JobDeduplicated { .. } => "job_deduplicated",
            Self::JobProgress { .. } => "job_progress",
            Self::JobCompleted { .. } => "job_completed",
            Self::JobFailed { .. } => "job_failed",
        }
    }

    /// Job the event refers to.
    #[must_use]
    pub const fn job_id(&self) -> Uuid {
        match self {
            Self::JobStarted { job_id, .. }
            | Self::JobDeduplicated { job_id, .. }
            | Self::JobProgress { job_id, .. }
            | Self::JobCompleted { job_id, .. }
            | Self::JobFailed { job_id, .. } => *job_id,
        }
    }

    /// Whether the event ends the job lifecycle.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::JobCompleted { .. } | Self::JobFailed { .. })
    }
}

/// Metadata wrapper around events. Each envelope tracks the event id and emission timestamp.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct EventEnvelope {
    /// Monotonic identifier assigned to the wrapped event.
    pub id: EventId,
    /// Timestamp recording when the envelope was produced.
    pub timestamp: DateTime<Utc>,
    /// Wrapped event payload.
    pub event: Event,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assert_event_kind(event: &Event, expected: &str) {
        assert_eq!(event.kind(), expected);
    }

    #[test]
    fn event_kind_maps_job_variants() {
        let id = Uuid::nil();
        assert_event_kind(
            &Event::JobStarted {
                job_id: id,
                operation: "batch".into(),
                path: "/photos/set".into(),
            },
            "job_started",
        );
        assert_event_kind(
            &Event::JobDeduplicated {
                job_id: id,
                operation: "batch".into(),
                path: "/photos/set".into(),
            },
            "job_deduplicated",
        );
        assert_event_kind(
            &Event::JobProgress {
                job_id: id,
                progress: 0.5,
            },
            "job_progress",
        );
        assert_event_kind(
            &Event::JobCompleted {
                job_id: id,
                result: None,
            },
            "job_completed",
        );
        assert_event_kind(
            &Event::JobFailed {
                job_id: id,
                message: "boom".into(),
            },
            "job_failed",
        );
    }

    #[test]
    fn terminal_events_are_flagged() {
        let id = Uuid::new_v4();
        assert!(
            Event::JobCompleted {
                job_id: id,
                result: Some(json!({"path": "/tmp"})),
            }
            .is_terminal()
        );
        assert!(
            Event::JobFailed {
                job_id: id,
                message: "err".into(),
            }
            .is_terminal()
        );
        assert!(
            !Event::JobProgress {
                job_id: id,
                progress: 0.1,
            }
            .is_terminal()
        );
    }

    #[test]
    fn events_serialise_with_snake_case_tag() {
        let id = Uuid::nil();
        let value = serde_json::to_value(Event::JobProgress {
            job_id: id,
            progress: 0.25,
        })
        .expect("serialise event");
        assert_eq!(value["type"], "job_progress");
        assert_eq!(value["progress"], 0.25);
        assert_eq!(
            Event::JobFailed {
                job_id: id,
                message: String::new(),
            }
            .job_id(),
            id
        );
    }
}
