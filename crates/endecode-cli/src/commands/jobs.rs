//! Commands that run as background jobs through the registry.

use std::path::{Path, PathBuf};

use anyhow::anyhow;
use endecode_fsops::{
    BatchOutcome, DecodedWatermark, RemovalReport, add_text_to_photo, create_folder_archive,
    decrypt_folder, encrypt_folder, remove_watermarks,
};
use endecode_runtime::{Job, OperationKind, ProgressReporter};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::info;

use crate::cli::{AddTextArgs, ArchiveArgs, BatchArgs, EncryptArgs, FolderArgs};
use crate::commands::follow::follow_job;
use crate::context::{AppContext, CliError, CliResult};
use crate::output::{
    render_archive, render_batch, render_decoded, render_encrypt, render_marked, render_removal,
};

/// Start `work`, follow it, and return the finished job.
async fn run_job<F>(
    ctx: &AppContext,
    operation: OperationKind,
    path: &Path,
    work: F,
) -> CliResult<Job>
where
    F: FnOnce(&ProgressReporter) -> anyhow::Result<Value> + Send + 'static,
{
    let outcome = ctx
        .registry
        .start(operation, &path.display().to_string(), work)
        .map_err(CliError::failure)?;
    if outcome.is_deduplicated() {
        info!(job_id = %outcome.job_id(), "joined job already running on this path");
    }
    follow_job(ctx, outcome.job_id()).await
}

/// [`run_job`] for work returning a serialisable value, decoded back on success.
async fn run_typed<T, F>(
    ctx: &AppContext,
    operation: OperationKind,
    path: &Path,
    work: F,
) -> CliResult<(Job, T)>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce(&ProgressReporter) -> anyhow::Result<T> + Send + 'static,
{
    let job = run_job(ctx, operation, path, move |progress| {
        Ok(serde_json::to_value(work(progress)?)?)
    })
    .await?;
    let typed = decode_result(&job)?;
    Ok((job, typed))
}

fn decode_result<T: DeserializeOwned>(job: &Job) -> CliResult<T> {
    let value = job.result.clone().unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|err| {
        CliError::failure(anyhow!("job {} returned an unexpected result: {err}", job.id))
    })
}

/// Result payload of a batch job: the outcome plus its first preview sample.
pub(crate) fn batch_payload(outcome: &BatchOutcome) -> anyhow::Result<Value> {
    let mut value = serde_json::to_value(outcome)?;
    if let Value::Object(map) = &mut value {
        let _ = map.insert(
            "watermark_sample".to_string(),
            serde_json::to_value(outcome.watermark_sample())?,
        );
    }
    Ok(value)
}

pub(crate) async fn handle_batch(ctx: &AppContext, args: BatchArgs) -> CliResult<()> {
    let source = ctx.source_folder(&args.path)?;
    let settings = args.settings();
    let orchestrator = ctx.orchestrator();
    orchestrator.validate(&source, &settings)?;

    let worker_source = source.clone();
    let job = run_job(ctx, OperationKind::Batch, &source, move |progress| {
        let outcome =
            orchestrator.run_batch(&worker_source, &settings, &|value| progress.report(value))?;
        batch_payload(&outcome)
    })
    .await?;
    let outcome: BatchOutcome = decode_result(&job)?;
    render_batch(&job, &outcome, ctx.output)
}

pub(crate) async fn handle_encrypt(ctx: &AppContext, args: EncryptArgs) -> CliResult<()> {
    let source = ctx.source_folder(&args.path)?;
    if args.name.trim().is_empty() {
        return Err(CliError::validation("--name must not be empty"));
    }
    let worker_source = source.clone();
    let (job, modified) = run_typed(ctx, OperationKind::Encrypt, &source, move |progress| {
        Ok(encrypt_folder(&worker_source, &args.name, &|value| {
            progress.report(value);
        })?)
    })
    .await?;
    render_encrypt(&job, modified, ctx.output)
}

pub(crate) async fn handle_decrypt(ctx: &AppContext, args: FolderArgs) -> CliResult<()> {
    let source = ctx.source_folder(&args.path)?;
    let worker_source = source.clone();
    let (job, found) = run_typed::<Vec<DecodedWatermark>, _>(
        ctx,
        OperationKind::Decrypt,
        &source,
        move |progress| Ok(decrypt_folder(&worker_source, &|value| progress.report(value))?),
    )
    .await?;
    render_decoded(&job, &found, ctx.output)
}

pub(crate) async fn handle_remove_watermarks(ctx: &AppContext, args: FolderArgs) -> CliResult<()> {
    let source = ctx.source_folder(&args.path)?;
    let worker_source = source.clone();
    let (job, report) = run_typed::<RemovalReport, _>(
        ctx,
        OperationKind::RemoveWatermarks,
        &source,
        move |progress| {
            Ok(remove_watermarks(&worker_source, &|value| {
                progress.report(value);
            })?)
        },
    )
    .await?;
    render_removal(&job, &report, ctx.output)
}

pub(crate) async fn handle_add_text(ctx: &AppContext, args: AddTextArgs) -> CliResult<()> {
    let source = ctx.source_folder(&args.path)?;
    let renderer = ctx.require_renderer()?;
    if args.text.trim().is_empty() {
        return Err(CliError::validation("--text must not be empty"));
    }
    let worker_source = source.clone();
    let (job, marked) = run_typed::<Option<PathBuf>, _>(
        ctx,
        OperationKind::AddText,
        &source,
        move |progress| {
            let marked =
                add_text_to_photo(renderer.as_ref(), &worker_source, &args.text, args.photo)?;
            progress.report(1.0);
            Ok(marked)
        },
    )
    .await?;
    render_marked(&job, marked.as_deref(), ctx.output)
}

pub(crate) async fn handle_archive(ctx: &AppContext, args: ArchiveArgs) -> CliResult<()> {
    let source = ctx.source_folder(&args.path)?;
    let destination = match args.destination {
        Some(destination) => destination,
        None => source
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| CliError::validation("the filesystem root cannot be archived"))?,
    };
    if destination.starts_with(&source) {
        return Err(CliError::validation(
            "the archive destination must be outside the archived folder",
        ));
    }
    let worker_source = source.clone();
    let name = args.name;
    let (job, archive) = run_typed::<PathBuf, _>(
        ctx,
        OperationKind::Archive,
        &source,
        move |progress| {
            let archive = create_folder_archive(&worker_source, &destination, name.as_deref())?;
            progress.report(1.0);
            Ok(archive)
        },
    )
    .await?;
    render_archive(&job, &archive, ctx.output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::OutputFormat;
    use endecode_config::EngineConfig;
    use endecode_fsops::SampleLocator;
    use endecode_runtime::JobStatus;
    use endecode_test_support::fixtures::MediaTree;

    type TestResult<T> = anyhow::Result<T>;

    fn context() -> TestResult<AppContext> {
        AppContext::new(EngineConfig::default(), OutputFormat::Json, true)
            .map_err(|err| anyhow!(err.display_message()))
    }

    #[test]
    fn batch_payload_carries_first_sample() -> TestResult<()> {
        let outcome = BatchOutcome {
            copies_root: PathBuf::from("/photos/Set-Copies"),
            copies: vec![endecode_fsops::CopyUnit {
                order_number: "001".into(),
                destination_folder: PathBuf::from("/photos/Set-Copies/001/Set"),
                archive_path: None,
                sample: Some(SampleLocator::File {
                    path: PathBuf::from("001/Set/001.jpg"),
                }),
            }],
        };
        let value = batch_payload(&outcome)?;
        assert_eq!(value["watermark_sample"]["kind"], "file");
        assert_eq!(value["watermark_sample"]["path"], "001/Set/001.jpg");
        let back: BatchOutcome = serde_json::from_value(value)?;
        assert_eq!(back, outcome);
        Ok(())
    }

    #[tokio::test]
    async fn batch_command_runs_through_registry() -> TestResult<()> {
        let tree = MediaTree::with_photos("Set", 3)?;
        let ctx = context()?;
        let args = BatchArgs {
            path: tree.root().to_path_buf(),
            copies: 2,
            base_text: "Client 5".into(),
            swap: false,
            visible: false,
            zip: true,
            visible_text: None,
            photo_number: None,
            order_as_photo: false,
            archive_name: None,
        };

        handle_batch(&ctx, args).await.map_err(|err| anyhow!(err.display_message()))?;

        let jobs = ctx.registry.list()?;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, JobStatus::Completed);
        assert!(tree.parent().join("Set-Copies/005/Set.zip").is_file());
        assert!(tree.parent().join("Set-Copies/006/Set.zip").is_file());
        Ok(())
    }

    #[tokio::test]
    async fn visible_batch_without_renderer_fails_validation() -> TestResult<()> {
        let tree = MediaTree::with_photos("Set", 1)?;
        let ctx = context()?;
        let args = BatchArgs {
            path: tree.root().to_path_buf(),
            copies: 1,
            base_text: String::new(),
            swap: false,
            visible: true,
            zip: false,
            visible_text: None,
            photo_number: None,
            order_as_photo: false,
            archive_name: None,
        };
        let err = handle_batch(&ctx, args).await.err();
        assert_eq!(err.map(|err| err.exit_code()), Some(2));
        assert!(ctx.registry.list()?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn failing_job_exits_with_failure_code() -> TestResult<()> {
        let tree = MediaTree::new("Docs")?;
        let ctx = context()?;
        // No supported files: the worker fails after the job is created.
        let err = handle_decrypt(
            &ctx,
            FolderArgs {
                path: tree.root().to_path_buf(),
            },
        )
        .await
        .err();
        assert_eq!(err.map(|err| err.exit_code()), Some(3));
        let jobs = ctx.registry.list()?;
        assert_eq!(jobs[0].status, JobStatus::Error);
        Ok(())
    }

    #[tokio::test]
    async fn archive_rejects_destination_inside_folder() -> TestResult<()> {
        let tree = MediaTree::with_photos("Set", 1)?;
        let ctx = context()?;
        let err = handle_archive(
            &ctx,
            ArchiveArgs {
                path: tree.root().to_path_buf(),
                destination: Some(std::fs::canonicalize(tree.root())?.join("out")),
                name: None,
            },
        )
        .await
        .err();
        assert_eq!(err.map(|err| err.exit_code()), Some(2));
        Ok(())
    }
}
