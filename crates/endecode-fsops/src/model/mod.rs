//! Domain models for the watermark engine.
//!
//! # Design
//! - Plain serde data carriers; no IO handles.
//! - Paths in results are relative to the copies root so they can be shown to users.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::classify::FileKind;
use crate::error::{FsOpsError, FsOpsResult};

/// Options controlling one batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Number of copies to produce; at least one.
    pub num_copies: u32,
    /// Base text; a trailing number sets the first order number.
    pub base_text: String,
    /// Swap the photos numbered `order` and `order + 10` in each copy.
    pub add_swap: bool,
    /// Draw a visible mark on one photo per copy.
    pub add_visible_watermark: bool,
    /// Package each copy into a STORED zip and delete the folder.
    pub create_zip: bool,
    /// Visible mark text; the order number when absent.
    pub visible_watermark_text: Option<String>,
    /// Photo that receives the visible mark; the order number when absent.
    pub target_photo_number: Option<u64>,
    /// Ignore `target_photo_number` and mark the photo matching the order number.
    pub use_order_number_as_photo_number: bool,
    /// Archive file stem; the cleaned source folder name when absent.
    pub archive_name: Option<String>,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            num_copies: 1,
            base_text: String::new(),
            add_swap: false,
            add_visible_watermark: false,
            create_zip: false,
            visible_watermark_text: None,
            target_photo_number: None,
            use_order_number_as_photo_number: false,
            archive_name: None,
        }
    }
}

impl BatchSettings {
    /// Reject settings that cannot produce a run.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::InvalidInput`] for a zero copy count, a trailing
    /// order number too large to count from, or an archive name containing
    /// path separators.
    pub fn validate(&self) -> FsOpsResult<()> {
        if self.num_copies == 0 {
            return Err(FsOpsError::invalid(
                "num_copies",
                "must be at least 1",
                Some(self.num_copies.to_string()),
            ));
        }
        let digits = trailing_digits(&self.base_text);
        if !digits.is_empty()
            && digits
                .parse::<u64>()
                .ok()
                .and_then(|start| start.checked_add(u64::from(self.num_copies)))
                .is_none()
        {
            return Err(FsOpsError::invalid(
                "base_text",
                "trailing order number is too large",
                Some(self.base_text.clone()),
            ));
        }
        if let Some(name) = self.archive_name.as_deref()
            && (name.trim().is_empty() || name.contains(['/', '\\']) || name == "..")
        {
            return Err(FsOpsError::invalid(
                "archive_name",
                "must be a plain file name",
                Some(name.to_string()),
            ));
        }
        Ok(())
    }

    /// Explicit visible mark text, ignoring blanks.
    #[must_use]
    pub fn visible_text(&self) -> Option<&str> {
        self.visible_watermark_text
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }

    /// Photo number that receives the visible mark for `order`.
    #[must_use]
    pub const fn target_photo(&self, order: u64) -> u64 {
        match self.target_photo_number {
            Some(number) if !self.use_order_number_as_photo_number => number,
            _ => order,
        }
    }
}

/// Trailing run of ASCII digits in `text`.
pub(crate) fn trailing_digits(text: &str) -> &str {
    let digits = text
        .bytes()
        .rev()
        .take_while(u8::is_ascii_digit)
        .count();
    &text[text.len() - digits..]
}

/// Where the visibly marked photo of a copy can be found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SampleLocator {
    /// Loose file, relative to the copies root.
    File {
        /// Path relative to the copies root.
        path: PathBuf,
    },
    /// Entry inside an archive.
    Archive {
        /// Archive path relative to the copies root.
        archive: PathBuf,
        /// `/`-separated entry name inside the archive.
        entry: String,
    },
}

/// One produced copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyUnit {
    /// Zero-padded order number (`001`).
    pub order_number: String,
    /// Folder the source tree was copied into.
    pub destination_folder: PathBuf,
    /// Archive replacing the folder, when zipping was requested.
    pub archive_path: Option<PathBuf>,
    /// Visibly marked photo, when one was found.
    pub sample: Option<SampleLocator>,
}

/// Result of a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// `<parent>/<source>-Copies`.
    pub copies_root: PathBuf,
    /// Copies in order.
    pub copies: Vec<CopyUnit>,
}

impl BatchOutcome {
    /// First available visible-mark sample, for previews.
    #[must_use]
    pub fn watermark_sample(&self) -> Option<&SampleLocator> {
        self.copies.iter().find_map(|unit| unit.sample.as_ref())
    }
}

/// Location of a binary watermark inside a tail window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkRecord {
    /// Offset of the start marker within the tail.
    pub start_offset: usize,
    /// Offset of the end marker within the tail.
    pub end_offset: usize,
    /// Bytes between the markers, when requested.
    pub content: Option<Vec<u8>>,
}

/// Two files exchanged by the swapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapPair {
    /// File numbered with the order number.
    pub file_a: PathBuf,
    /// File numbered `order + 10`.
    pub file_b: PathBuf,
    /// Number of `file_a`.
    pub number_a: u64,
    /// Number of `file_b`.
    pub number_b: u64,
}

impl SwapPair {
    /// Name the content at `path` carries after the swap.
    #[must_use]
    pub fn follow(&self, path: &Path) -> PathBuf {
        if path == self.file_a {
            self.file_b.clone()
        } else if path == self.file_b {
            self.file_a.clone()
        } else {
            path.to_path_buf()
        }
    }
}

/// Watermark recovered from one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedWatermark {
    /// File carrying the watermark.
    pub path: PathBuf,
    /// Category of the file.
    pub kind: FileKind,
    /// Decoded payload.
    pub text: String,
}

/// Summary of a watermark removal pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalReport {
    /// Media files inspected.
    pub scanned: usize,
    /// Files that were truncated.
    pub removed: usize,
    /// Files that could not be processed.
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_photo_falls_back_to_order() {
        let mut settings = BatchSettings {
            target_photo_number: Some(3),
            ..BatchSettings::default()
        };
        assert_eq!(settings.target_photo(7), 3);
        settings.use_order_number_as_photo_number = true;
        assert_eq!(settings.target_photo(7), 7);
        settings.use_order_number_as_photo_number = false;
        settings.target_photo_number = None;
        assert_eq!(settings.target_photo(7), 7);
    }

    #[test]
    fn validate_rejects_zero_copies_and_nested_names() {
        let zero = BatchSettings {
            num_copies: 0,
            ..BatchSettings::default()
        };
        assert!(zero.validate().is_err_and(|err| err.is_invalid_input()));

        let nested = BatchSettings {
            archive_name: Some("../escape".into()),
            ..BatchSettings::default()
        };
        assert!(nested.validate().is_err());
        assert!(BatchSettings::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_order_number_beyond_counting_range() {
        let oversized = BatchSettings {
            base_text: "Set 99999999999999999999".into(),
            ..BatchSettings::default()
        };
        let err = oversized.validate().err();
        assert!(matches!(
            err,
            Some(FsOpsError::InvalidInput {
                field: "base_text",
                ..
            })
        ));

        let at_edge = BatchSettings {
            base_text: format!("Set {}", u64::MAX - 1),
            num_copies: 2,
            ..BatchSettings::default()
        };
        assert!(at_edge.validate().is_err_and(|err| err.is_invalid_input()));

        let fits = BatchSettings {
            base_text: "Set 42".into(),
            num_copies: 3,
            ..BatchSettings::default()
        };
        assert!(fits.validate().is_ok());
    }

    #[test]
    fn blank_visible_text_is_ignored() {
        let settings = BatchSettings {
            visible_watermark_text: Some("  ".into()),
            ..BatchSettings::default()
        };
        assert_eq!(settings.visible_text(), None);
    }

    #[test]
    fn swap_pair_follows_content() {
        let pair = SwapPair {
            file_a: PathBuf::from("/c/5.jpg"),
            file_b: PathBuf::from("/c/15.jpg"),
            number_a: 5,
            number_b: 15,
        };
        assert_eq!(pair.follow(Path::new("/c/5.jpg")), PathBuf::from("/c/15.jpg"));
        assert_eq!(pair.follow(Path::new("/c/15.jpg")), PathBuf::from("/c/5.jpg"));
        assert_eq!(pair.follow(Path::new("/c/7.jpg")), PathBuf::from("/c/7.jpg"));
    }

    #[test]
    fn sample_locator_serialises_with_kind_tag() -> anyhow::Result<()> {
        let value = serde_json::to_value(SampleLocator::Archive {
            archive: PathBuf::from("001/Set.zip"),
            entry: "photos/3.jpg".into(),
        })?;
        assert_eq!(value["kind"], "archive");
        assert_eq!(value["entry"], "photos/3.jpg");
        Ok(())
    }
}
