//! Caesar-shift codec and the textual watermark wire format.
//!
//! Letters rotate within their case and digits within `0-9` by [`SHIFT`];
//! everything else, including non-ASCII text, passes through unchanged.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{FsOpsError, FsOpsResult};

/// Fixed rotation applied by [`encode`].
pub const SHIFT: u8 = 7;
/// Opening delimiter of a watermark, textual or binary.
pub const WATERMARK_START: &str = "<<==";
/// Closing delimiter of a watermark, textual or binary.
pub const WATERMARK_END: &str = "==>>";
/// Prefix of the legacy, unencoded textual watermark.
pub const LEGACY_PREFIX: &str = "*/";

fn rotate(c: char, letter_shift: u8, digit_shift: u8) -> char {
    let Ok(byte) = u8::try_from(c) else {
        return c;
    };
    let rotated = match byte {
        b'A'..=b'Z' => b'A' + (byte - b'A' + letter_shift) % 26,
        b'a'..=b'z' => b'a' + (byte - b'a' + letter_shift) % 26,
        b'0'..=b'9' => b'0' + (byte - b'0' + digit_shift) % 10,
        _ => return c,
    };
    char::from(rotated)
}

/// Rotate letters and digits forward by [`SHIFT`].
#[must_use]
pub fn encode(text: &str) -> String {
    text.chars().map(|c| rotate(c, SHIFT, SHIFT)).collect()
}

/// Exact inverse of [`encode`].
#[must_use]
pub fn decode(text: &str) -> String {
    text.chars()
        .map(|c| rotate(c, 26 - SHIFT, 10 - SHIFT))
        .collect()
}

/// Build the textual wire form `<<==` + `encode(text)` + `==>>`.
#[must_use]
pub fn text_watermark(text: &str) -> String {
    format!("{WATERMARK_START}{}{WATERMARK_END}", encode(text))
}

/// Pull the still-encoded payload out of textual content.
///
/// The delimited format wins when its last start marker precedes its last end
/// marker; otherwise the trimmed remainder after the last legacy `*/` is
/// returned. Content with neither yields an empty string.
#[must_use]
pub fn extract_text(content: &str) -> String {
    if let (Some(start), Some(end)) = (
        content.rfind(WATERMARK_START),
        content.rfind(WATERMARK_END),
    ) && start < end
    {
        let from = start + WATERMARK_START.len();
        if from <= end {
            return content[from..end].to_string();
        }
    }
    content
        .rfind(LEGACY_PREFIX)
        .map(|start| content[start + LEGACY_PREFIX.len()..].trim().to_string())
        .unwrap_or_default()
}

/// [`extract_text`] followed by [`decode`].
#[must_use]
pub fn extract_and_decode(content: &str) -> String {
    decode(&extract_text(content))
}

/// Append `wire` to the file unless the exact bytes are already present.
///
/// Returns whether a write happened. The file is compared byte-wise, so this
/// is safe for content that is not valid UTF-8.
///
/// # Errors
///
/// Returns an error if the file cannot be read or appended to.
pub fn append_text_watermark_if_absent(path: &Path, wire: &str) -> FsOpsResult<bool> {
    let content = fs::read(path).map_err(|err| FsOpsError::io("read", path, err))?;
    if contains_bytes(&content, wire.as_bytes()) {
        debug!(path = %path.display(), "text watermark already present");
        return Ok(false);
    }
    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|err| FsOpsError::io("open for append", path, err))?;
    file.write_all(wire.as_bytes())
        .map_err(|err| FsOpsError::io("append watermark to", path, err))?;
    info!(path = %path.display(), "text watermark appended");
    Ok(true)
}

pub(crate) fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|window| window == needle)
}
