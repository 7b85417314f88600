//! Single-shot folder operations.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::classify::{FileKind, find_image_numbered, list_files, supported_files};
use crate::codec::{decode, extract_and_decode};
use crate::error::{FsOpsError, FsOpsResult};
use crate::model::{DecodedWatermark, RemovalReport};
use crate::overlay::{Anchor, OverlayRenderer};
use crate::policy::{TypeAwareWatermarkPolicy, WatermarkPolicy};
use crate::watermark::{extract_watermark_text, remove_watermark};

/// Require `path` to be an existing directory.
///
/// # Errors
///
/// Returns [`FsOpsError::InvalidInput`] otherwise.
pub fn ensure_folder(path: &Path) -> FsOpsResult<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(FsOpsError::invalid(
            "path",
            "must be an existing directory",
            Some(path.display().to_string()),
        ))
    }
}

#[allow(clippy::cast_precision_loss)]
fn fraction(done: usize, total: usize) -> f64 {
    if total == 0 {
        1.0
    } else {
        done as f64 / total as f64
    }
}

/// Watermark every supported file under `path` with `name`.
///
/// Images and videos get binary markers, text files a text watermark.
/// Returns the number of files modified.
///
/// # Errors
///
/// Returns an error for a blank name, a folder without supported files, or
/// the first file that cannot be written.
pub fn encrypt_folder(path: &Path, name: &str, progress: &dyn Fn(f64)) -> FsOpsResult<usize> {
    ensure_folder(path)?;
    if name.trim().is_empty() {
        return Err(FsOpsError::invalid("name", "must not be empty", None));
    }
    let files = supported_files(path)?;
    if files.is_empty() {
        return Err(FsOpsError::invalid(
            "path",
            "contains no supported files",
            Some(path.display().to_string()),
        ));
    }
    let policy = TypeAwareWatermarkPolicy;
    let mut modified = 0;
    for (index, file) in files.iter().enumerate() {
        if policy.apply(file, name)? {
            modified += 1;
        }
        progress(fraction(index + 1, files.len()));
    }
    info!(path = %path.display(), files = files.len(), modified, "folder watermarked");
    Ok(modified)
}

/// Decode the watermark of every supported file under `path`.
///
/// Files that cannot be read are logged and skipped; files without a
/// watermark are omitted.
///
/// # Errors
///
/// Returns an error if the folder holds no supported files.
pub fn decrypt_folder(path: &Path, progress: &dyn Fn(f64)) -> FsOpsResult<Vec<DecodedWatermark>> {
    ensure_folder(path)?;
    let files = supported_files(path)?;
    if files.is_empty() {
        return Err(FsOpsError::invalid(
            "path",
            "contains no supported files",
            Some(path.display().to_string()),
        ));
    }
    let mut found = Vec::new();
    for (index, file) in files.iter().enumerate() {
        let kind = FileKind::of(file);
        match decode_file(file, kind) {
            Ok(Some(text)) => found.push(DecodedWatermark {
                path: file.clone(),
                kind,
                text,
            }),
            Ok(None) => {}
            Err(err) => warn!(path = %file.display(), error = %err, "skipping unreadable file"),
        }
        progress(fraction(index + 1, files.len()));
    }
    info!(path = %path.display(), found = found.len(), "folder decoded");
    Ok(found)
}

fn decode_file(path: &Path, kind: FileKind) -> FsOpsResult<Option<String>> {
    let encoded = extract_watermark_text(path)?;
    if !encoded.is_empty() {
        return Ok(Some(decode(&encoded)));
    }
    if kind != FileKind::Text {
        return Ok(None);
    }
    let bytes = fs::read(path).map_err(|err| FsOpsError::io("read", path, err))?;
    let text = extract_and_decode(&String::from_utf8_lossy(&bytes));
    Ok((!text.is_empty()).then_some(text))
}

/// Strip binary watermarks from every image and video under `path`.
///
/// Per-file failures are logged and counted rather than aborting the pass.
///
/// # Errors
///
/// Returns an error if the folder cannot be listed.
pub fn remove_watermarks(path: &Path, progress: &dyn Fn(f64)) -> FsOpsResult<RemovalReport> {
    ensure_folder(path)?;
    let files = list_files(path, FileKind::is_media)?;
    let mut report = RemovalReport {
        scanned: files.len(),
        ..RemovalReport::default()
    };
    for (index, file) in files.iter().enumerate() {
        match remove_watermark(file) {
            Ok(true) => report.removed += 1,
            Ok(false) => {}
            Err(err) => {
                warn!(path = %file.display(), error = %err, "watermark removal failed");
                report.failed += 1;
            }
        }
        progress(fraction(index + 1, files.len()));
    }
    if files.is_empty() {
        progress(1.0);
    }
    info!(
        path = %path.display(),
        scanned = report.scanned,
        removed = report.removed,
        failed = report.failed,
        "watermark removal finished"
    );
    Ok(report)
}

/// Draw `text` on the photo numbered `photo_number` under `path`.
///
/// Returns the marked image, or `None` when no photo carries that number.
///
/// # Errors
///
/// Returns an error for blank text, an unreadable folder, or a renderer failure.
pub fn add_text_to_photo(
    renderer: &dyn OverlayRenderer,
    path: &Path,
    text: &str,
    photo_number: u64,
) -> FsOpsResult<Option<PathBuf>> {
    ensure_folder(path)?;
    if text.trim().is_empty() {
        return Err(FsOpsError::invalid("text", "must not be empty", None));
    }
    let Some(image) = find_image_numbered(path, photo_number)? else {
        info!(path = %path.display(), photo = photo_number, "no photo with that number");
        return Ok(None);
    };
    renderer
        .draw_text(&image, text, Anchor::BottomRight)
        .map_err(|source| FsOpsError::Overlay {
            path: image.clone(),
            source,
        })?;
    info!(image = %image.display(), "visible text added");
    Ok(Some(image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OverlayError;
    use crate::watermark::has_watermark;
    use endecode_test_support::assert::assert_progress_complete;
    use endecode_test_support::fixtures::{MediaTree, PHOTO_BYTES, padded};
    use std::cell::RefCell;

    type TestResult<T> = anyhow::Result<T>;

    struct StampOverlay;

    impl OverlayRenderer for StampOverlay {
        fn draw_text(&self, image: &Path, text: &str, _: Anchor) -> Result<(), OverlayError> {
            let mut bytes = fs::read(image)?;
            bytes.extend_from_slice(text.as_bytes());
            fs::write(image, bytes)?;
            Ok(())
        }
    }

    #[test]
    fn encrypt_then_decrypt_recovers_name() -> TestResult<()> {
        let tree = MediaTree::with_photos("Album", 2)?;
        tree.write("readme.txt", b"hello")?;
        tree.write("movie.mov", &padded(40, 300))?;
        let seen = RefCell::new(Vec::new());

        let modified = encrypt_folder(tree.root(), "Alice", &|v| seen.borrow_mut().push(v))?;
        assert_eq!(modified, 4);
        assert_progress_complete(&seen.borrow());
        assert!(has_watermark(&tree.path("001.jpg"))?);

        // Idempotent.
        assert_eq!(encrypt_folder(tree.root(), "Alice", &|_| {})?, 0);

        let decoded = decrypt_folder(tree.root(), &|_| {})?;
        assert_eq!(decoded.len(), 4);
        assert!(decoded.iter().all(|entry| entry.text == "Alice"));
        let text = decoded
            .iter()
            .find(|entry| entry.kind == FileKind::Text)
            .ok_or_else(|| anyhow::anyhow!("text entry missing"))?;
        assert!(text.path.ends_with("readme.txt"));
        Ok(())
    }

    #[test]
    fn encrypt_rejects_empty_folder_and_blank_name() -> TestResult<()> {
        let tree = MediaTree::new("Empty")?;
        tree.write("data.bin", b"x")?;
        assert!(encrypt_folder(tree.root(), "Bob", &|_| {}).is_err_and(|e| e.is_invalid_input()));
        tree.write("a.txt", b"x")?;
        assert!(encrypt_folder(tree.root(), "  ", &|_| {}).is_err_and(|e| e.is_invalid_input()));
        Ok(())
    }

    #[test]
    fn decrypt_skips_files_without_watermark() -> TestResult<()> {
        let tree = MediaTree::with_photos("Plain", 1)?;
        tree.write("legacy.txt", b"note */Jhyvs")?;
        let decoded = decrypt_folder(tree.root(), &|_| {})?;
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].text, "Carol");
        Ok(())
    }

    #[test]
    fn remove_watermarks_restores_media() -> TestResult<()> {
        let tree = MediaTree::with_photos("Album", 2)?;
        tree.write("tiny.png", b"small")?;
        tree.write("keep.txt", b"text")?;
        encrypt_folder(tree.root(), "Dave", &|_| {})?;
        let seen = RefCell::new(Vec::new());

        let report = remove_watermarks(tree.root(), &|v| seen.borrow_mut().push(v))?;

        assert_eq!(report.scanned, 3);
        assert_eq!(report.removed, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(tree.read("001.jpg")?, padded(1, PHOTO_BYTES));
        assert_progress_complete(&seen.borrow());
        // Text files are not touched by removal.
        assert!(tree.read("keep.txt")?.starts_with(b"text"));
        assert!(tree.read("keep.txt")?.len() > 4);
        Ok(())
    }

    #[test]
    fn remove_watermarks_on_folder_without_media_reports_completion() -> TestResult<()> {
        let tree = MediaTree::new("Docs")?;
        let seen = RefCell::new(Vec::new());
        let report = remove_watermarks(tree.root(), &|v| seen.borrow_mut().push(v))?;
        assert_eq!(report, RemovalReport::default());
        assert_eq!(*seen.borrow(), vec![1.0]);
        Ok(())
    }

    #[test]
    fn add_text_to_photo_marks_numbered_image() -> TestResult<()> {
        let tree = MediaTree::with_photos("Album", 3)?;
        let marked = add_text_to_photo(&StampOverlay, tree.root(), "SAMPLE", 2)?;
        assert_eq!(marked, Some(tree.path("002.jpg")));
        assert!(tree.read("002.jpg")?.ends_with(b"SAMPLE"));
        assert_eq!(add_text_to_photo(&StampOverlay, tree.root(), "SAMPLE", 9)?, None);
        assert!(add_text_to_photo(&StampOverlay, tree.root(), "", 1).is_err());
        Ok(())
    }
}
