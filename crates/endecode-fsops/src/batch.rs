//! Batch copy pipeline.
//!
//! # Design
//! - One blocking pass per run: copy, watermark, optional visible mark and
//!   swap per copy, then an optional archive stage over all copies.
//! - Every step reports a pipeline metric; the first failure aborts the run
//!   and leaves finished copies on disk.
//! - Progress is a fraction of completed steps, so it never decreases and the
//!   last step reports exactly `1.0`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use endecode_telemetry::Metrics;
use tracing::{info, info_span, warn};

use crate::archive::{clean_archive_name, create_folder_archive, entry_name};
use crate::classify::{find_image_numbered, supported_files};
use crate::error::{FsOpsError, FsOpsResult};
use crate::model::{BatchOutcome, BatchSettings, CopyUnit, SampleLocator, trailing_digits};
use crate::overlay::{Anchor, OverlayRenderer};
use crate::policy::{BatchFileWatermarkPolicy, WatermarkPolicy};
use crate::swap::perform_order_swap;
use crate::tree::copy_tree;

const COPIES_SUFFIX: &str = "-Copies";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StepKind {
    Copy,
    Watermark,
    VisibleMark,
    Swap,
    Archive,
}

impl StepKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Watermark => "watermark",
            Self::VisibleMark => "visible_mark",
            Self::Swap => "swap",
            Self::Archive => "archive",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StepStatus {
    Completed,
    Skipped,
    Failed,
}

impl StepStatus {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

enum StepOutcome<T> {
    Completed(T),
    Skipped(T),
}

struct ProgressTracker<'a> {
    done: u64,
    total: u64,
    sink: &'a dyn Fn(f64),
}

impl<'a> ProgressTracker<'a> {
    fn new(total: u64, sink: &'a dyn Fn(f64)) -> Self {
        Self {
            done: 0,
            total: total.max(1),
            sink,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn advance(&mut self) {
        self.done = (self.done + 1).min(self.total);
        (self.sink)(self.done as f64 / self.total as f64);
    }
}

/// Runs batch copy jobs against a source folder.
#[derive(Clone)]
pub struct BatchOrchestrator {
    metrics: Metrics,
    renderer: Option<Arc<dyn OverlayRenderer>>,
    policy: BatchFileWatermarkPolicy,
}

impl BatchOrchestrator {
    /// Orchestrator without a visible-mark renderer.
    #[must_use]
    pub const fn new(metrics: Metrics) -> Self {
        Self {
            metrics,
            renderer: None,
            policy: BatchFileWatermarkPolicy,
        }
    }

    /// Attach the renderer used for visible marks.
    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn OverlayRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Check a request before any copy is made.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::InvalidInput`] when the source is not a directory,
    /// the settings are invalid, or visible marks are requested without a
    /// renderer.
    pub fn validate(&self, source: &Path, settings: &BatchSettings) -> FsOpsResult<()> {
        if !source.is_dir() {
            return Err(FsOpsError::invalid(
                "source",
                "must be an existing directory",
                Some(source.display().to_string()),
            ));
        }
        settings.validate()?;
        if settings.add_visible_watermark && self.renderer.is_none() {
            return Err(FsOpsError::invalid(
                "add_visible_watermark",
                "no overlay renderer is configured",
                None,
            ));
        }
        Ok(())
    }

    /// Produce `settings.num_copies` watermarked copies of `source`.
    ///
    /// Copies land in `<parent>/<source name>-Copies/<order>/<source name>`.
    /// `progress` receives the completed fraction after every step.
    ///
    /// # Errors
    ///
    /// Returns the first step failure; copies finished before it stay on disk.
    pub fn run_batch(
        &self,
        source: &Path,
        settings: &BatchSettings,
        progress: &dyn Fn(f64),
    ) -> FsOpsResult<BatchOutcome> {
        self.validate(source, settings)?;
        let source = resolve_source(source)?;
        let base_name = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                FsOpsError::invalid(
                    "source",
                    "has no folder name",
                    Some(source.display().to_string()),
                )
            })?;
        let parent = source.parent().unwrap_or_else(|| Path::new("."));
        let copies_root = parent.join(format!("{base_name}{COPIES_SUFFIX}"));

        let start_number = start_number(&settings.base_text);
        let stem = text_stem(&settings.base_text);
        let mut tracker = ProgressTracker::new(total_steps(settings), progress);
        info!(
            source = %source.display(),
            copies = settings.num_copies,
            start_number,
            "batch started"
        );

        let mut copies = Vec::with_capacity(usize::try_from(settings.num_copies).unwrap_or(0));
        for index in 0..u64::from(settings.num_copies) {
            let order_value = start_number.saturating_add(index);
            let order_number = format!("{order_value:03}");
            let _span = info_span!("batch_copy", order = %order_number).entered();

            let order_dir = copies_root.join(&order_number);
            let destination = order_dir.join(&base_name);
            self.execute_step(StepKind::Copy, &mut tracker, || {
                copy_tree(&source, &destination).map(StepOutcome::Completed)
            })?;

            let payload = format!("{stem} {order_number}");
            self.execute_step(StepKind::Watermark, &mut tracker, || {
                let mut marked = 0_usize;
                for file in supported_files(&destination)? {
                    if self.policy.apply(&file, &payload)? {
                        marked += 1;
                    }
                }
                info!(files = marked, "copy watermarked");
                Ok(StepOutcome::Completed(()))
            })?;

            let mut sample = None;
            if settings.add_visible_watermark {
                sample = self.execute_step(StepKind::VisibleMark, &mut tracker, || {
                    self.draw_visible_mark(&destination, settings, order_value, &order_number)
                })?;
            }

            if settings.add_swap {
                let pair = self.execute_step(StepKind::Swap, &mut tracker, || {
                    perform_order_swap(&destination, &order_number).map(|pair| match pair {
                        Some(pair) => StepOutcome::Completed(Some(pair)),
                        None => StepOutcome::Skipped(None),
                    })
                })?;
                if let (Some(pair), Some(marked)) = (pair, sample.as_ref()) {
                    sample = Some(pair.follow(marked));
                }
            }

            copies.push(PendingCopy {
                order_number,
                order_dir,
                destination,
                marked: sample,
            });
        }

        let mut units = Vec::with_capacity(copies.len());
        let archive_name = settings
            .archive_name
            .clone()
            .unwrap_or_else(|| clean_archive_name(&base_name));
        for copy in copies {
            let unit = if settings.create_zip {
                let _span = info_span!("batch_archive", order = %copy.order_number).entered();
                self.execute_step(StepKind::Archive, &mut tracker, || {
                    archive_copy(&copy, &copies_root, &archive_name).map(StepOutcome::Completed)
                })?
            } else {
                copy.into_unit(&copies_root)
            };
            units.push(unit);
        }

        info!(copies_root = %copies_root.display(), copies = units.len(), "batch completed");
        Ok(BatchOutcome {
            copies_root,
            copies: units,
        })
    }

    fn draw_visible_mark(
        &self,
        destination: &Path,
        settings: &BatchSettings,
        order_value: u64,
        order_number: &str,
    ) -> FsOpsResult<StepOutcome<Option<PathBuf>>> {
        let Some(renderer) = self.renderer.as_ref() else {
            return Err(FsOpsError::invalid(
                "add_visible_watermark",
                "no overlay renderer is configured",
                None,
            ));
        };
        let target = settings.target_photo(order_value);
        let Some(image) = find_image_numbered(destination, target)? else {
            info!(photo = target, "no photo to mark in copy");
            return Ok(StepOutcome::Skipped(None));
        };
        let text = settings.visible_text().unwrap_or(order_number);
        renderer
            .draw_text(&image, text, Anchor::BottomRight)
            .map_err(|source| FsOpsError::Overlay {
                path: image.clone(),
                source,
            })?;
        Ok(StepOutcome::Completed(Some(image)))
    }

    fn execute_step<T, F>(
        &self,
        step: StepKind,
        tracker: &mut ProgressTracker<'_>,
        op: F,
    ) -> FsOpsResult<T>
    where
        F: FnOnce() -> FsOpsResult<StepOutcome<T>>,
    {
        match op() {
            Ok(outcome) => {
                let (status, value) = match outcome {
                    StepOutcome::Completed(value) => (StepStatus::Completed, value),
                    StepOutcome::Skipped(value) => (StepStatus::Skipped, value),
                };
                self.metrics
                    .inc_pipeline_step(step.as_str(), status.as_str());
                tracker.advance();
                Ok(value)
            }
            Err(err) => {
                self.metrics
                    .inc_pipeline_step(step.as_str(), StepStatus::Failed.as_str());
                warn!(step = step.as_str(), error = %err, "batch step failed");
                Err(err)
            }
        }
    }
}

struct PendingCopy {
    order_number: String,
    order_dir: PathBuf,
    destination: PathBuf,
    marked: Option<PathBuf>,
}

impl PendingCopy {
    fn into_unit(self, copies_root: &Path) -> CopyUnit {
        let sample = self.marked.map(|path| SampleLocator::File {
            path: relative_to(copies_root, &path),
        });
        CopyUnit {
            order_number: self.order_number,
            destination_folder: self.destination,
            archive_path: None,
            sample,
        }
    }
}

fn archive_copy(copy: &PendingCopy, copies_root: &Path, name: &str) -> FsOpsResult<CopyUnit> {
    let archive = create_folder_archive(&copy.destination, &copy.order_dir, Some(name))?;
    let sample = match copy.marked.as_deref() {
        Some(marked) => Some(SampleLocator::Archive {
            archive: relative_to(copies_root, &archive),
            entry: entry_name(&copy.destination, marked)?,
        }),
        None => None,
    };
    fs::remove_dir_all(&copy.destination)
        .map_err(|err| FsOpsError::io("remove archived folder", &copy.destination, err))?;
    Ok(CopyUnit {
        order_number: copy.order_number.clone(),
        destination_folder: copy.destination.clone(),
        archive_path: Some(archive),
        sample,
    })
}

fn resolve_source(source: &Path) -> FsOpsResult<PathBuf> {
    if source.file_name().is_some() {
        return Ok(source.to_path_buf());
    }
    fs::canonicalize(source).map_err(|err| FsOpsError::io("resolve", source, err))
}

fn relative_to(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root)
        .map_or_else(|_| path.to_path_buf(), Path::to_path_buf)
}

fn total_steps(settings: &BatchSettings) -> u64 {
    let per_copy = 2
        + u64::from(settings.add_visible_watermark)
        + u64::from(settings.add_swap)
        + u64::from(settings.create_zip);
    u64::from(settings.num_copies) * per_copy
}

/// First order number: the trailing number of `base_text`, or 1.
fn start_number(base_text: &str) -> u64 {
    trailing_digits(base_text).parse().unwrap_or(1)
}

/// `base_text` without its trailing number, trimmed.
fn text_stem(base_text: &str) -> &str {
    let digits = trailing_digits(base_text).len();
    base_text[..base_text.len() - digits].trim()
}
