//! On-disk ledger trees for tests.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A temporary directory of ledger files.
///
/// The directory is deleted when this value is dropped, even on panic.
/// [`LedgerTree::root`] is canonical, so paths built from it compare equal
/// to the canonical paths reported by discovery and include resolution.
pub struct LedgerTree {
    root: PathBuf,
    _temp_dir: TempDir,
}

impl LedgerTree {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let root = temp_dir
            .path()
            .canonicalize()
            .expect("failed to canonicalize temp dir");
        Self {
            root,
            _temp_dir: temp_dir,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of `rel` inside the tree, without touching disk.
    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    /// Write `content` to `rel`, creating parent directories.
    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dirs");
        }
        std::fs::write(&path, content).expect("failed to write ledger file");
        path
    }

    pub fn mkdir(&self, rel: &str) -> PathBuf {
        let path = self.path(rel);
        std::fs::create_dir_all(&path).expect("failed to create dir");
        path
    }

    /// Create a symlink at `link` pointing to `target` (both relative to the root).
    #[cfg(unix)]
    pub fn symlink(&self, target: &str, link: &str) -> PathBuf {
        let link_path = self.path(link);
        if let Some(parent) = link_path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dirs");
        }
        std::os::unix::fs::symlink(self.path(target), &link_path)
            .expect("failed to create symlink");
        link_path
    }
}

impl Default for LedgerTree {
    fn default() -> Self {
        Self::new()
    }
}
