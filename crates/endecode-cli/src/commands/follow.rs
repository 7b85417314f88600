//! Follow a running job until it finishes.

use anyhow::anyhow;
use endecode_runtime::{Job, JobStatus};
use uuid::Uuid;

use crate::context::{AppContext, CliError, CliResult};
use crate::output::format_progress;

/// Stream progress for `job_id` to stderr and return the final record.
pub(crate) async fn follow_job(ctx: &AppContext, job_id: Uuid) -> CliResult<Job> {
    let mut subscription = ctx
        .registry
        .subscribe(job_id)
        .map_err(CliError::failure)?
        .ok_or_else(|| CliError::failure(anyhow!("job {job_id} is not known")))?;

    let mut last_printed = None;
    while let Some(update) = subscription.next().await {
        let label = format_progress(update.progress);
        if !ctx.quiet && last_printed.as_deref() != Some(label.as_str()) {
            eprintln!("[{job_id}] {} {label}", update.status.as_str());
            last_printed = Some(label);
        }
        if update.status.is_terminal() {
            break;
        }
    }

    let job = ctx
        .registry
        .get(job_id)
        .map_err(CliError::failure)?
        .ok_or_else(|| CliError::failure(anyhow!("job {job_id} expired before completion")))?;
    match job.status {
        JobStatus::Completed => Ok(job),
        JobStatus::Error => Err(CliError::failure(anyhow!(
            "job {job_id} failed: {}",
            job.error.as_deref().unwrap_or("unknown error")
        ))),
        JobStatus::Processing => Err(CliError::failure(anyhow!(
            "lost track of job {job_id} while it was still running"
        ))),
    }
}
