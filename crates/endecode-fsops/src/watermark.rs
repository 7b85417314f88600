//! Binary watermarks appended to arbitrary files and found by tail scanning.
//!
//! Only the last [`MAX_TAIL_BYTES`] bytes of a file are inspected. Files
//! shorter than that window are never reported as watermarked, even when the
//! marker bytes are present.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::codec::{WATERMARK_END, WATERMARK_START};
use crate::error::{FsOpsError, FsOpsResult};
use crate::model::WatermarkRecord;

/// Size of the scanned tail window.
pub const MAX_TAIL_BYTES: u64 = 100;

/// Trailing window of a file together with the file's total size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tail {
    /// Last [`MAX_TAIL_BYTES`] bytes.
    pub bytes: Vec<u8>,
    /// Total size of the file.
    pub file_size: u64,
}

/// Read the tail window of `path`, or `None` when the file is too short.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn read_tail(path: &Path) -> FsOpsResult<Option<Tail>> {
    let mut file = File::open(path).map_err(|err| FsOpsError::io("open", path, err))?;
    let file_size = file
        .metadata()
        .map_err(|err| FsOpsError::io("stat", path, err))?
        .len();
    if file_size < MAX_TAIL_BYTES {
        return Ok(None);
    }
    file.seek(SeekFrom::Start(file_size - MAX_TAIL_BYTES))
        .map_err(|err| FsOpsError::io("seek in", path, err))?;
    let mut bytes = Vec::new();
    file.take(MAX_TAIL_BYTES)
        .read_to_end(&mut bytes)
        .map_err(|err| FsOpsError::io("read tail of", path, err))?;
    Ok(Some(Tail { bytes, file_size }))
}

/// Locate the last watermark in `tail`.
///
/// The last start marker wins; the end marker is the first one after it.
#[must_use]
pub fn find_watermark(tail: &[u8], include_content: bool) -> Option<WatermarkRecord> {
    let start_marker = WATERMARK_START.as_bytes();
    let end_marker = WATERMARK_END.as_bytes();
    let start = tail
        .windows(start_marker.len())
        .rposition(|window| window == start_marker)?;
    let content_start = start + start_marker.len();
    let end = content_start
        + tail[content_start..]
            .windows(end_marker.len())
            .position(|window| window == end_marker)?;
    Some(WatermarkRecord {
        start_offset: start,
        end_offset: end,
        content: include_content.then(|| tail[content_start..end].to_vec()),
    })
}

/// Whether the tail of `path` holds a watermark.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn has_watermark(path: &Path) -> FsOpsResult<bool> {
    Ok(read_tail(path)?.is_some_and(|tail| find_watermark(&tail.bytes, false).is_some()))
}

/// Append `START + encoded + END` unless a watermark is already present.
///
/// Returns whether the file was modified.
///
/// # Errors
///
/// Returns an error if the file cannot be read or appended to.
pub fn add_watermark(path: &Path, encoded: &str) -> FsOpsResult<bool> {
    if has_watermark(path)? {
        debug!(path = %path.display(), "binary watermark already present");
        return Ok(false);
    }
    let mut payload =
        Vec::with_capacity(WATERMARK_START.len() + encoded.len() + WATERMARK_END.len());
    payload.extend_from_slice(WATERMARK_START.as_bytes());
    payload.extend_from_slice(encoded.as_bytes());
    payload.extend_from_slice(WATERMARK_END.as_bytes());

    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|err| FsOpsError::io("open for append", path, err))?;
    file.write_all(&payload)
        .map_err(|err| FsOpsError::io("append watermark to", path, err))?;
    info!(path = %path.display(), "binary watermark added");
    Ok(true)
}

/// Still-encoded content of the last watermark, or an empty string.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn extract_watermark_text(path: &Path) -> FsOpsResult<String> {
    let text = read_tail(path)?
        .and_then(|tail| find_watermark(&tail.bytes, true))
        .and_then(|record| record.content)
        .map(|content| String::from_utf8_lossy(&content).into_owned())
        .unwrap_or_default();
    if !text.is_empty() {
        debug!(path = %path.display(), "binary watermark found");
    }
    Ok(text)
}

/// Truncate the file at the start of its last watermark.
///
/// Returns whether a watermark was removed; a file without one is left untouched.
///
/// # Errors
///
/// Returns an error if the file cannot be read or truncated.
pub fn remove_watermark(path: &Path) -> FsOpsResult<bool> {
    let Some(tail) = read_tail(path)? else {
        return Ok(false);
    };
    let Some(record) = find_watermark(&tail.bytes, false) else {
        return Ok(false);
    };
    let tail_len = tail.bytes.len() as u64;
    let cut = tail.file_size - (tail_len - record.start_offset as u64);
    let file = OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|err| FsOpsError::io("open for truncate", path, err))?;
    file.set_len(cut)
        .map_err(|err| FsOpsError::io("truncate", path, err))?;
    info!(path = %path.display(), offset = cut, "binary watermark removed");
    Ok(true)
}
