//! Deterministic, uncompressed (STORED) zip archives of folder trees.
//!
//! Entries are written through [`zip::ZipWriter`], which records the CRC-32
//! and equal compressed/uncompressed sizes of every file. Entry names are
//! `/`-separated paths relative to the archived folder, visited in file-name
//! order. System clutter (`__MACOSX*`, dot files, `*.DS_Store`) is skipped
//! together with everything beneath it.

use std::ffi::OsStr;
use std::fs::{self, File, Metadata};
use std::io::{self, BufReader, BufWriter, Seek, Write};
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Datelike, Local, Timelike};
use tracing::info;
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{FsOpsError, FsOpsResult};

const ARCHIVE_EXTENSION: &str = "zip";
const ZIP32_LIMIT: u64 = 0xFFFF_FFFF;

/// Whether a file name is system clutter that never goes into an archive.
#[must_use]
pub fn is_system_name(name: &OsStr) -> bool {
    let name = name.to_string_lossy();
    name.starts_with("__MACOSX") || name.starts_with('.') || name.ends_with(".DS_Store")
}

/// Strip an upload suffix of eight hex digits (`Set_1a2b3c4d` becomes `Set`).
#[must_use]
pub fn clean_archive_name(name: &str) -> String {
    match name.rsplit_once('_') {
        Some((stem, suffix))
            if !stem.is_empty()
                && suffix.len() == 8
                && suffix.chars().all(|c| c.is_ascii_hexdigit()) =>
        {
            stem.to_string()
        }
        _ => name.to_string(),
    }
}

/// Archive `folder` into `<destination_dir>/<name>.zip`.
///
/// `name` defaults to the folder's base name.
///
/// # Errors
///
/// Returns an error if the folder cannot be walked or read, or the archive
/// cannot be written.
pub fn create_folder_archive(
    folder: &Path,
    destination_dir: &Path,
    name: Option<&str>,
) -> FsOpsResult<PathBuf> {
    ensure_directory(folder)?;
    let stem = name.map_or_else(|| base_name(folder), str::to_string);
    let archive_path = destination_dir.join(format!("{stem}.{ARCHIVE_EXTENSION}"));
    fs::create_dir_all(destination_dir)
        .map_err(|err| FsOpsError::io("create archive directory", destination_dir, err))?;
    let file =
        File::create(&archive_path).map_err(|err| FsOpsError::io("create", &archive_path, err))?;
    let mut writer = stream_folder_archive(BufWriter::new(file), folder)?;
    writer
        .flush()
        .map_err(|err| FsOpsError::io("flush", &archive_path, err))?;
    info!(folder = %folder.display(), archive = %archive_path.display(), "archive created");
    Ok(archive_path)
}

/// Write a STORED archive of `folder` into `writer` and hand the writer back.
///
/// The writer must be seekable so entry headers can be completed once the
/// data is written; wrap sockets or pipes in a buffer first.
///
/// # Errors
///
/// Returns an error if the folder cannot be walked or read, or the writer fails.
pub fn stream_folder_archive<W: Write + Seek>(writer: W, folder: &Path) -> FsOpsResult<W> {
    ensure_directory(folder)?;
    let mut archive = ZipWriter::new(writer);
    let walker = WalkDir::new(folder)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_system_name(entry.file_name()));
    for entry in walker {
        let entry = entry.map_err(|err| FsOpsError::walkdir("walk archive source", folder, err))?;
        let name = entry_name(folder, entry.path())?;
        let metadata = entry
            .metadata()
            .map_err(|err| FsOpsError::walkdir("stat archive entry", entry.path(), err))?;
        if metadata.is_dir() {
            archive
                .add_directory(format!("{name}/"), entry_options(&metadata))
                .map_err(|err| FsOpsError::zip("add directory", entry.path(), err))?;
        } else if metadata.is_file() {
            add_file(&mut archive, &name, entry.path(), &metadata)?;
        }
    }
    archive
        .finish()
        .map_err(|err| FsOpsError::zip("finish archive of", folder, err))
}

fn add_file<W: Write + Seek>(
    archive: &mut ZipWriter<W>,
    name: &str,
    path: &Path,
    metadata: &Metadata,
) -> FsOpsResult<()> {
    let options = entry_options(metadata).large_file(metadata.len() > ZIP32_LIMIT);
    archive
        .start_file(name, options)
        .map_err(|err| FsOpsError::zip("add entry", path, err))?;
    let file = File::open(path).map_err(|err| FsOpsError::io("open", path, err))?;
    io::copy(&mut BufReader::new(file), archive)
        .map_err(|err| FsOpsError::io("archive", path, err))?;
    Ok(())
}

fn entry_options(metadata: &Metadata) -> FileOptions {
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .last_modified_time(modified_time(metadata.modified().ok()));
    match unix_mode(metadata) {
        Some(mode) => options.unix_permissions(mode),
        None => options,
    }
}

/// `/`-separated path of `path` relative to `root`.
///
/// # Errors
///
/// Returns an error if `path` is not under `root`.
pub fn entry_name(root: &Path, path: &Path) -> FsOpsResult<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        FsOpsError::invalid(
            "entry",
            "path is outside the archived folder",
            Some(path.display().to_string()),
        )
    })?;
    let parts: Vec<_> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect();
    Ok(parts.join("/"))
}

fn ensure_directory(folder: &Path) -> FsOpsResult<()> {
    if folder.is_dir() {
        Ok(())
    } else {
        Err(FsOpsError::invalid(
            "folder",
            "must be an existing directory",
            Some(folder.display().to_string()),
        ))
    }
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "archive".to_string())
}

#[cfg(unix)]
fn unix_mode(metadata: &Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(metadata.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
const fn unix_mode(_metadata: &Metadata) -> Option<u32> {
    None
}

/// Local modification time in zip form; dates before 1980 clamp to the epoch.
fn modified_time(modified: Option<SystemTime>) -> zip::DateTime {
    modified
        .map(DateTime::<Local>::from)
        .and_then(|local| {
            zip::DateTime::from_date_and_time(
                u16::try_from(local.year()).ok()?,
                u8::try_from(local.month()).ok()?,
                u8::try_from(local.day()).ok()?,
                u8::try_from(local.hour()).ok()?,
                u8::try_from(local.minute()).ok()?,
                u8::try_from(local.second()).ok()?,
            )
            .ok()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};
    use zip::ZipArchive;

    fn sample_tree(root: &Path) -> anyhow::Result<()> {
        fs::create_dir_all(root.join("photos/raw"))?;
        fs::create_dir_all(root.join("__MACOSX/photos"))?;
        fs::create_dir_all(root.join(".hidden"))?;
        fs::write(root.join("photos/1.jpg"), b"first photo")?;
        fs::write(root.join("photos/raw/2.png"), b"second photo")?;
        fs::write(root.join("notes.txt"), b"")?;
        fs::write(root.join(".DS_Store"), b"junk")?;
        fs::write(root.join("photos/Icon.DS_Store"), b"junk")?;
        fs::write(root.join("__MACOSX/photos/._1.jpg"), b"junk")?;
        fs::write(root.join(".hidden/secret.txt"), b"junk")?;
        Ok(())
    }

    fn build(folder: &Path) -> FsOpsResult<Vec<u8>> {
        Ok(stream_folder_archive(Cursor::new(Vec::new()), folder)?.into_inner())
    }

    fn listing(bytes: Vec<u8>) -> anyhow::Result<Vec<(String, u32, bool)>> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::new();
        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            assert_eq!(file.compression(), CompressionMethod::Stored);
            let mut content = Vec::new();
            file.read_to_end(&mut content)?;
            assert_eq!(content.len() as u64, file.size());
            entries.push((file.name().to_string(), file.crc32(), file.is_dir()));
        }
        Ok(entries)
    }

    #[test]
    fn stream_archive_is_readable_and_filtered() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        sample_tree(dir.path())?;

        let entries = listing(build(dir.path())?)?;
        let names: Vec<_> = entries.iter().map(|(name, _, _)| name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "notes.txt",
                "photos/",
                "photos/1.jpg",
                "photos/raw/",
                "photos/raw/2.png",
            ]
        );
        assert!(entries.iter().any(|(name, _, is_dir)| name == "photos/" && *is_dir));
        let mut archive = ZipArchive::new(Cursor::new(build(dir.path())?))?;
        let mut photo = archive.by_name("photos/1.jpg")?;
        assert_eq!(photo.size(), photo.compressed_size());
        let mut content = Vec::new();
        photo.read_to_end(&mut content)?;
        assert_eq!(content, b"first photo");
        Ok(())
    }

    #[test]
    fn repeated_builds_are_identical_in_names_and_checksums() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        sample_tree(dir.path())?;
        let first = listing(build(dir.path())?)?;
        let second = listing(build(dir.path())?)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn named_archive_lands_in_destination() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let folder = dir.path().join("Set_1a2b3c4d");
        fs::create_dir_all(&folder)?;
        fs::write(folder.join("3.jpg"), b"three")?;

        let archive = create_folder_archive(&folder, dir.path(), None)?;
        assert_eq!(archive, dir.path().join("Set_1a2b3c4d.zip"));

        let cleaned = clean_archive_name("Set_1a2b3c4d");
        let archive = create_folder_archive(&folder, dir.path(), Some(&cleaned))?;
        assert_eq!(archive, dir.path().join("Set.zip"));
        let entries = listing(fs::read(&archive)?)?;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "3.jpg");
        Ok(())
    }

    #[test]
    fn empty_folder_produces_valid_empty_archive() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        assert!(listing(build(dir.path())?)?.is_empty());
        Ok(())
    }

    #[test]
    fn clean_archive_name_only_strips_hex_suffix() {
        assert_eq!(clean_archive_name("Wedding_deadbeef"), "Wedding");
        assert_eq!(clean_archive_name("Wedding_2024"), "Wedding_2024");
        assert_eq!(clean_archive_name("Wedding_zzzzzzzz"), "Wedding_zzzzzzzz");
        assert_eq!(clean_archive_name("_deadbeef"), "_deadbeef");
        assert_eq!(clean_archive_name("Plain"), "Plain");
    }

    #[test]
    fn missing_folder_is_invalid_input() {
        let err = build(Path::new("/definitely/not/here"));
        assert!(err.is_err_and(|err| err.is_invalid_input()));
    }

    #[test]
    fn system_names_are_detected() {
        assert!(is_system_name(OsStr::new("__MACOSX")));
        assert!(is_system_name(OsStr::new(".git")));
        assert!(is_system_name(OsStr::new("Icon.DS_Store")));
        assert!(!is_system_name(OsStr::new("photo.jpg")));
    }
}
