//! Extension-based file categories and filename number extraction.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{FsOpsError, FsOpsResult};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv"];
const TEXT_EXTENSIONS: &[&str] = &["txt"];

/// Category of a file, decided by its extension alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// `jpg`, `jpeg`, `png`.
    Image,
    /// `mp4`, `avi`, `mov`, `mkv`.
    Video,
    /// `txt`.
    Text,
    /// Anything else.
    Unsupported,
}

impl FileKind {
    /// Classify `path` by its (case-insensitive) extension.
    #[must_use]
    pub fn of(path: &Path) -> Self {
        let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
            return Self::Unsupported;
        };
        let ext = ext.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Self::Image
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Self::Video
        } else if TEXT_EXTENSIONS.contains(&ext.as_str()) {
            Self::Text
        } else {
            Self::Unsupported
        }
    }

    /// Image, video, or text.
    #[must_use]
    pub const fn is_supported(self) -> bool {
        !matches!(self, Self::Unsupported)
    }

    /// Image or video; the kinds that carry binary watermarks.
    #[must_use]
    pub const fn is_media(self) -> bool {
        matches!(self, Self::Image | Self::Video)
    }

    /// Lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Text => "text",
            Self::Unsupported => "unsupported",
        }
    }
}

/// First maximal run of ASCII digits in `name`, parsed as an integer.
///
/// Runs too long for `u64` are treated as absent.
#[must_use]
pub fn extract_leading_number(name: &str) -> Option<u64> {
    let start = name.find(|c: char| c.is_ascii_digit())?;
    let run = &name[start..];
    let len = run
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(run.len());
    run[..len].parse::<u64>().ok()
}

/// Number embedded in the file name of `path`.
#[must_use]
pub fn file_number(path: &Path) -> Option<u64> {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(extract_leading_number)
}

/// Recursively list files under `root` whose kind satisfies `keep`, sorted by path.
///
/// # Errors
///
/// Returns an error if the directory tree cannot be traversed.
pub fn list_files<F>(root: &Path, keep: F) -> FsOpsResult<Vec<PathBuf>>
where
    F: Fn(FileKind) -> bool,
{
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|err| FsOpsError::walkdir("list files under", root, err))?;
        if entry.file_type().is_file() && keep(FileKind::of(entry.path())) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Every supported file under `root`.
///
/// # Errors
///
/// Returns an error if the directory tree cannot be traversed.
pub fn supported_files(root: &Path) -> FsOpsResult<Vec<PathBuf>> {
    list_files(root, FileKind::is_supported)
}

/// First image under `root` whose file number equals `number`.
///
/// # Errors
///
/// Returns an error if the directory tree cannot be traversed.
pub fn find_image_numbered(root: &Path, number: u64) -> FsOpsResult<Option<PathBuf>> {
    Ok(list_files(root, |kind| kind == FileKind::Image)?
        .into_iter()
        .find(|path| file_number(path) == Some(number)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn kinds_are_case_insensitive() {
        assert_eq!(FileKind::of(Path::new("a/IMG_01.JPG")), FileKind::Image);
        assert_eq!(FileKind::of(Path::new("clip.Mkv")), FileKind::Video);
        assert_eq!(FileKind::of(Path::new("readme.txt")), FileKind::Text);
        assert_eq!(FileKind::of(Path::new("archive.zip")), FileKind::Unsupported);
        assert_eq!(FileKind::of(Path::new("no_extension")), FileKind::Unsupported);
        assert!(FileKind::Video.is_media());
        assert!(!FileKind::Text.is_media());
        assert!(FileKind::Text.is_supported());
    }

    #[test]
    fn leading_number_takes_first_digit_run() {
        assert_eq!(extract_leading_number("photo_012_v2.jpg"), Some(12));
        assert_eq!(extract_leading_number("15.png"), Some(15));
        assert_eq!(extract_leading_number("cover.jpg"), None);
        assert_eq!(extract_leading_number("99999999999999999999999.jpg"), None);
    }

    #[test]
    fn listing_is_recursive_and_sorted() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::create_dir_all(dir.path().join("sub"))?;
        fs::write(dir.path().join("b_2.jpg"), b"b")?;
        fs::write(dir.path().join("a_1.txt"), b"a")?;
        fs::write(dir.path().join("sub/c_3.mp4"), b"c")?;
        fs::write(dir.path().join("skip.zip"), b"z")?;

        let files = supported_files(dir.path())?;
        let names: Vec<_> = files
            .iter()
            .filter_map(|path| path.file_name()?.to_str())
            .collect();
        assert_eq!(names, vec!["a_1.txt", "b_2.jpg", "c_3.mp4"]);

        assert_eq!(
            find_image_numbered(dir.path(), 2)?,
            Some(dir.path().join("b_2.jpg"))
        );
        assert_eq!(find_image_numbered(dir.path(), 3)?, None);
        Ok(())
    }
}
