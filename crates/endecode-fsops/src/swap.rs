//! Rename-based exchange of two files.
//!
//! The exchange is three renames: `a -> temp`, `b -> a`, `temp -> b`. A failed
//! second rename is rolled back on a best-effort basis; failures of the first
//! or third rename are returned as-is. The sequence is not atomic across
//! crashes.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::classify::{FileKind, file_number, list_files};
use crate::error::{FsOpsError, FsOpsResult};
use crate::model::SwapPair;

/// Distance between the two photo numbers that get exchanged.
pub const SWAP_OFFSET: u64 = 10;

fn temp_path(file_a: &Path) -> PathBuf {
    let base = file_a
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = format!("temp_{}_{base}", std::process::id());
    file_a
        .parent()
        .map_or_else(|| PathBuf::from(&name), |dir| dir.join(&name))
}

/// Exchange the contents of `file_a` and `file_b` by renaming.
///
/// # Errors
///
/// Returns the IO error of the failing rename.
pub fn swap_files(file_a: &Path, file_b: &Path) -> FsOpsResult<()> {
    let temp = temp_path(file_a);
    fs::rename(file_a, &temp).map_err(|err| FsOpsError::io("move aside", file_a, err))?;
    if let Err(err) = fs::rename(file_b, file_a) {
        if let Err(restore) = fs::rename(&temp, file_a) {
            warn!(
                path = %file_a.display(),
                error = %restore,
                "failed to restore file after aborted swap"
            );
        }
        return Err(FsOpsError::io("move into place", file_b, err));
    }
    fs::rename(&temp, file_b).map_err(|err| FsOpsError::io("move into place", &temp, err))?;
    info!(a = %file_a.display(), b = %file_b.display(), "files swapped");
    Ok(())
}

/// Swap the images numbered `order` and `order + 10` under `folder`.
///
/// Returns the exchanged pair, or `None` when either image is missing.
///
/// # Errors
///
/// Returns an error if `order_number` is not numeric, the folder cannot be
/// listed, or a rename fails.
pub fn perform_order_swap(folder: &Path, order_number: &str) -> FsOpsResult<Option<SwapPair>> {
    let number_a = order_number.trim().parse::<u64>().map_err(|_| {
        FsOpsError::invalid(
            "order_number",
            "must be a decimal number",
            Some(order_number.to_string()),
        )
    })?;
    let number_b = number_a + SWAP_OFFSET;

    let images = list_files(folder, |kind| kind == FileKind::Image)?;
    let find = |number: u64| {
        images
            .iter()
            .find(|path| file_number(path) == Some(number))
            .cloned()
    };
    let (Some(file_a), Some(file_b)) = (find(number_a), find(number_b)) else {
        info!(
            folder = %folder.display(),
            number_a,
            number_b,
            "no matching pair to swap"
        );
        return Ok(None);
    };

    swap_files(&file_a, &file_b)?;
    Ok(Some(SwapPair {
        file_a,
        file_b,
        number_a,
        number_b,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_swap_exchanges_contents() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("IMG_5.jpg"), b"five")?;
        fs::write(dir.path().join("IMG_15.jpg"), b"fifteen")?;
        fs::write(dir.path().join("IMG_6.jpg"), b"six")?;

        let pair = perform_order_swap(dir.path(), "005")?;
        assert!(pair.is_some_and(|pair| pair.number_a == 5 && pair.number_b == 15));
        assert_eq!(fs::read(dir.path().join("IMG_5.jpg"))?, b"fifteen");
        assert_eq!(fs::read(dir.path().join("IMG_15.jpg"))?, b"five");
        assert_eq!(fs::read(dir.path().join("IMG_6.jpg"))?, b"six");
        assert_eq!(fs::read_dir(dir.path())?.count(), 3);
        Ok(())
    }

    #[test]
    fn missing_partner_is_a_no_op() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("15.jpg"), b"fifteen")?;
        assert_eq!(perform_order_swap(dir.path(), "005")?, None);
        assert_eq!(fs::read(dir.path().join("15.jpg"))?, b"fifteen");
        Ok(())
    }

    #[test]
    fn non_numeric_order_is_rejected() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let err = perform_order_swap(dir.path(), "abc");
        assert!(err.is_err_and(|err| err.is_invalid_input()));
        Ok(())
    }

    #[test]
    fn failed_second_rename_restores_first_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let a = dir.path().join("1.jpg");
        fs::write(&a, b"one")?;
        let missing = dir.path().join("11.jpg");

        assert!(swap_files(&a, &missing).is_err());
        assert_eq!(fs::read(&a)?, b"one");
        assert!(!temp_path(&a).exists());
        Ok(())
    }
}
