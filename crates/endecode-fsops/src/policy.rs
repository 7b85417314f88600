//! Per-file watermark policies.
//!
//! Two policies coexist on purpose. The batch pipeline binary-embeds only
//! videos and text-appends everything else, images included. Single-shot
//! encryption binary-embeds images and videos and text-appends only text
//! files.

use std::path::Path;

use crate::classify::FileKind;
use crate::codec::{append_text_watermark_if_absent, encode, text_watermark};
use crate::error::FsOpsResult;
use crate::watermark::add_watermark;

/// How a watermark is written into one file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Embedding {
    /// Binary markers around the encoded payload, found by tail scanning.
    Binary,
    /// Delimited, encoded text appended when absent.
    Text,
}

/// Decides how each file kind receives a watermark payload.
pub trait WatermarkPolicy: Send + Sync {
    /// Embedding for `kind`, or `None` to leave the file alone.
    fn embedding(&self, kind: FileKind) -> Option<Embedding>;

    /// Watermark `path` with the plain-text `payload`.
    ///
    /// Returns whether the file was modified.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or written.
    fn apply(&self, path: &Path, payload: &str) -> FsOpsResult<bool> {
        match self.embedding(FileKind::of(path)) {
            Some(Embedding::Binary) => add_watermark(path, &encode(payload)),
            Some(Embedding::Text) => append_text_watermark_if_absent(path, &text_watermark(payload)),
            None => Ok(false),
        }
    }
}

/// Batch pipeline policy: videos binary, every other supported file text.
#[derive(Clone, Copy, Debug, Default)]
pub struct BatchFileWatermarkPolicy;

impl WatermarkPolicy for BatchFileWatermarkPolicy {
    fn embedding(&self, kind: FileKind) -> Option<Embedding> {
        match kind {
            FileKind::Video => Some(Embedding::Binary),
            FileKind::Image | FileKind::Text => Some(Embedding::Text),
            FileKind::Unsupported => None,
        }
    }
}

/// Single-shot encryption policy: images and videos binary, text files text.
#[derive(Clone, Copy, Debug, Default)]
pub struct TypeAwareWatermarkPolicy;

impl WatermarkPolicy for TypeAwareWatermarkPolicy {
    fn embedding(&self, kind: FileKind) -> Option<Embedding> {
        match kind {
            FileKind::Image | FileKind::Video => Some(Embedding::Binary),
            FileKind::Text => Some(Embedding::Text),
            FileKind::Unsupported => None,
        }
    }
}
