//! Recursive folder copies.

use std::fs;
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{FsOpsError, FsOpsResult};

/// Copy the tree rooted at `source` into `destination`.
///
/// Directory structure and permission bits are preserved; symlinks are
/// followed and copied as regular files.
///
/// # Errors
///
/// Returns an error on the first entry that cannot be read or written.
pub fn copy_tree(source: &Path, destination: &Path) -> FsOpsResult<()> {
    fs::create_dir_all(destination)
        .map_err(|err| FsOpsError::io("create destination directory", destination, err))?;

    let mut directories = Vec::new();
    for entry in WalkDir::new(source).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|err| FsOpsError::walkdir("traverse copy source", source, err))?;
        let relative = entry.path().strip_prefix(source).map_err(|_| {
            FsOpsError::invalid(
                "source",
                "entry escaped the copy root",
                Some(entry.path().display().to_string()),
            )
        })?;
        let target = destination.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .map_err(|err| FsOpsError::io("create directory", &target, err))?;
            directories.push((entry.into_path(), target));
        } else {
            fs::copy(entry.path(), &target)
                .map_err(|err| FsOpsError::io("copy file", entry.path(), err))?;
        }
    }

    // Applied last so read-only directories still accept their children.
    for (original, target) in directories.into_iter().rev() {
        let permissions = fs::metadata(&original)
            .map_err(|err| FsOpsError::io("stat", &original, err))?
            .permissions();
        fs::set_permissions(&target, permissions)
            .map_err(|err| FsOpsError::io("set permissions on", &target, err))?;
    }
    debug!(source = %source.display(), destination = %destination.display(), "tree copied");
    Ok(())
}
