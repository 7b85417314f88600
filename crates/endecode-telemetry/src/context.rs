//! Span helpers for application and job context.
//!
//! # Design
//! - Provides an application-level span guard so top-level spans carry mode/build info.
//! - Job workers run inside a `job` span carrying the job id and operation.

use tracing::{Span, span::Entered};

use crate::init::build_sha;

/// Guard that keeps the application-level span entered for the lifetime of the process.
pub struct GlobalContextGuard {
    _guard: Entered<'static>,
}

impl GlobalContextGuard {
    #[must_use]
    /// Enter the application-level tracing span for the lifetime of the guard.
    pub fn new(mode: impl Into<String>) -> Self {
        let mode = mode.into();
        let span: &'static Span = Box::leak(Box::new(
            tracing::info_span!("app", mode = %mode, build_sha = %build_sha()),
        ));
        let guard = span.enter();
        Self { _guard: guard }
    }
}

/// Build the span a job worker runs in.
#[must_use]
pub fn job_span(job_id: &str, operation: &str, path: &str) -> Span {
    tracing::info_span!("job", job_id = %job_id, operation = %operation, path = %path)
}
