//! Output renderers and formatting helpers for CLI commands.

use std::path::Path;

use anyhow::anyhow;
use endecode_fsops::{BatchOutcome, DecodedWatermark, RemovalReport, SampleLocator};
use endecode_runtime::Job;
use endecode_telemetry::Metrics;
use serde::Serialize;
use serde_json::json;

use crate::cli::OutputFormat;
use crate::commands::InspectReport;
use crate::context::{CliError, CliResult};

fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    println!("{text}");
    Ok(())
}

fn print_job_header(job: &Job) {
    println!("job: {}", job.id);
    println!("operation: {}", job.operation);
    println!("status: {}", job.status.as_str());
    if let Some(finished) = job.finished_at {
        let elapsed = finished - job.start_time;
        println!("elapsed: {}ms", elapsed.num_milliseconds());
    }
}

pub(crate) fn render_batch(job: &Job, outcome: &BatchOutcome, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(job)?,
        OutputFormat::Table => {
            print_job_header(job);
            println!("copies root: {}", outcome.copies_root.display());
            println!("{:<6} {:<8} {:<50} SAMPLE", "ORDER", "KIND", "LOCATION");
            for unit in &outcome.copies {
                let (kind, location) = unit.archive_path.as_ref().map_or_else(
                    || ("folder", unit.destination_folder.display().to_string()),
                    |archive| ("archive", archive.display().to_string()),
                );
                let sample = unit.sample.as_ref().map_or_else(|| "-".to_string(), format_sample);
                println!("{:<6} {kind:<8} {location:<50} {sample}", unit.order_number);
            }
            if let Some(sample) = outcome.watermark_sample() {
                println!("preview: {}", format_sample(sample));
            }
        }
    }
    Ok(())
}

pub(crate) fn render_encrypt(job: &Job, modified: usize, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(job)?,
        OutputFormat::Table => {
            print_job_header(job);
            println!("files watermarked: {modified}");
        }
    }
    Ok(())
}

pub(crate) fn render_decoded(
    job: &Job,
    found: &[DecodedWatermark],
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(job)?,
        OutputFormat::Table => {
            print_job_header(job);
            if found.is_empty() {
                println!("no watermarks found");
                return Ok(());
            }
            println!("{:<6} {:<24} PATH", "KIND", "TEXT");
            for entry in found {
                println!(
                    "{:<6} {:<24} {}",
                    format_kind(entry),
                    entry.text,
                    entry.path.display()
                );
            }
        }
    }
    Ok(())
}

pub(crate) fn render_removal(
    job: &Job,
    report: &RemovalReport,
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(job)?,
        OutputFormat::Table => {
            print_job_header(job);
            println!(
                "scanned: {} removed: {} failed: {}",
                report.scanned, report.removed, report.failed
            );
        }
    }
    Ok(())
}

pub(crate) fn render_marked(job: &Job, marked: Option<&Path>, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(job)?,
        OutputFormat::Table => {
            print_job_header(job);
            match marked {
                Some(path) => println!("marked: {}", path.display()),
                None => println!("no photo carries that number"),
            }
        }
    }
    Ok(())
}

pub(crate) fn render_archive(job: &Job, archive: &Path, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(job)?,
        OutputFormat::Table => {
            print_job_header(job);
            println!("archive: {}", archive.display());
        }
    }
    Ok(())
}

pub(crate) fn render_inspect(report: &InspectReport, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(report)?,
        OutputFormat::Table => {
            println!("file: {}", report.path);
            println!("watermarked: {}", report.watermarked);
            if let Some(encoded) = &report.encoded {
                println!("encoded: {encoded}");
            }
            if let Some(decoded) = &report.decoded {
                println!("decoded: {decoded}");
            }
        }
    }
    Ok(())
}

pub(crate) fn render_codec(input: &str, output: &str, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&json!({ "input": input, "output": output }))?,
        OutputFormat::Table => println!("{output}"),
    }
    Ok(())
}

/// Metrics go to stderr so they never mix with command output.
pub(crate) fn render_metrics(metrics: &Metrics, format: OutputFormat) -> CliResult<()> {
    let text = metrics_text(metrics, format)?;
    eprintln!("{text}");
    Ok(())
}

fn metrics_text(metrics: &Metrics, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(&metrics.snapshot())
            .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}"))),
        OutputFormat::Table => metrics
            .render()
            .map_err(|err| CliError::failure(anyhow!("failed to render metrics: {err}"))),
    }
}

#[must_use]
pub(crate) fn format_progress(fraction: f64) -> String {
    format!("{:.1}%", fraction.clamp(0.0, 1.0) * 100.0)
}

#[must_use]
pub(crate) fn format_sample(sample: &SampleLocator) -> String {
    match sample {
        SampleLocator::File { path } => path.display().to_string(),
        SampleLocator::Archive { archive, entry } => format!("{}!{entry}", archive.display()),
    }
}

const fn format_kind(entry: &DecodedWatermark) -> &'static str {
    match entry.kind {
        endecode_fsops::FileKind::Image => "image",
        endecode_fsops::FileKind::Video => "video",
        endecode_fsops::FileKind::Text => "text",
        endecode_fsops::FileKind::Unsupported => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn progress_is_rendered_as_clamped_percentage() {
        assert_eq!(format_progress(0.0), "0.0%");
        assert_eq!(format_progress(0.5), "50.0%");
        assert_eq!(format_progress(1.7), "100.0%");
    }

    #[test]
    fn metrics_render_as_exposition_text_or_snapshot() -> anyhow::Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_job_started("batch");
        metrics.inc_pipeline_step("copy", "completed");

        let text = metrics_text(&metrics, OutputFormat::Table)
            .map_err(|err| anyhow!(err.display_message()))?;
        assert!(text.contains("pipeline_steps_total"));
        assert!(text.contains("jobs_started_total"));

        let json = metrics_text(&metrics, OutputFormat::Json)
            .map_err(|err| anyhow!(err.display_message()))?;
        let value: serde_json::Value = serde_json::from_str(&json)?;
        assert_eq!(value["active_jobs"], 1);
        Ok(())
    }

    #[test]
    fn samples_render_archive_entries() {
        let file = SampleLocator::File {
            path: PathBuf::from("001/Set/003.jpg"),
        };
        assert_eq!(format_sample(&file), "001/Set/003.jpg");
        let archived = SampleLocator::Archive {
            archive: PathBuf::from("002/Set.zip"),
            entry: "Set/013.jpg".into(),
        };
        assert_eq!(format_sample(&archived), "002/Set.zip!Set/013.jpg");
    }
}
