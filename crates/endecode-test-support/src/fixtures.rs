//! Temporary media folders for filesystem tests.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

/// Size of generated photo files; above the binary tail window.
pub const PHOTO_BYTES: usize = 256;

/// Deterministic filler of `len` bytes seeded by `seed`.
#[must_use]
pub fn padded(seed: u8, len: usize) -> Vec<u8> {
    (0..len)
        .map(|index| seed.wrapping_add(u8::try_from(index % 251).unwrap_or(0)))
        .collect()
}

/// Source folder living in its own temporary parent directory.
///
/// The parent is removed when the fixture drops, together with any
/// `<name>-Copies` sibling a batch run produced.
pub struct MediaTree {
    parent: TempDir,
    root: PathBuf,
}

impl MediaTree {
    /// Create an empty source folder called `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directory cannot be created.
    pub fn new(name: &str) -> Result<Self> {
        let parent = tempfile::tempdir().context("failed to create temp dir")?;
        let root = parent.path().join(name);
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create {}", root.display()))?;
        Ok(Self { parent, root })
    }

    /// Create a folder holding `count` photos named `001.jpg`, `002.jpg`, ...
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be written.
    pub fn with_photos(name: &str, count: u8) -> Result<Self> {
        let tree = Self::new(name)?;
        for number in 1..=count {
            tree.write(&format!("{number:03}.jpg"), &padded(number, PHOTO_BYTES))?;
        }
        Ok(tree)
    }

    /// Source folder path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory containing the source folder.
    #[must_use]
    pub fn parent(&self) -> &Path {
        self.parent.path()
    }

    /// Absolute path of `relative` inside the source folder.
    #[must_use]
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Write `bytes` to `relative`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write(&self, relative: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path(relative);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Read `relative` back from the source folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn read(&self, relative: &str) -> Result<Vec<u8>> {
        let path = self.path(relative);
        fs::read(&path).with_context(|| format!("failed to read {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padded_is_deterministic() {
        assert_eq!(padded(3, 4), vec![3, 4, 5, 6]);
        assert_eq!(padded(3, 300).len(), 300);
    }

    #[test]
    fn with_photos_writes_numbered_files() -> Result<()> {
        let tree = MediaTree::with_photos("Set", 12)?;
        assert!(tree.path("001.jpg").is_file());
        assert!(tree.path("012.jpg").is_file());
        assert_eq!(tree.read("005.jpg")?.len(), PHOTO_BYTES);
        assert_eq!(tree.root().parent(), Some(tree.parent()));
        Ok(())
    }
}
