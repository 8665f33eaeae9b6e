//! Ledger file discovery: a recursive directory walk with cycle protection.
//!
//! ## Architecture
//!
//! The walk is breadth-first over an explicit queue instead of recursion,
//! and each directory's entries are sorted before they are queued. Every
//! directory is resolved to its canonical path before it is read; a
//! canonical path that was already visited is not read again, which both
//! breaks symlink cycles and collapses several symlinks to one physical
//! directory. Because of the breadth-first order a physical directory is
//! always claimed at the shallowest depth it can be reached from, so a
//! symlink reaching it from deeper down cannot push its contents past the
//! depth limit. Ties at equal depth go to the smaller path.
//! Directories below `max_depth`, excluded names, hidden directories and
//! operating-system paths are skipped. Per-entry I/O failures are recorded
//! and the walk carries on.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use ledgerscope_config::DiscoveryConfig;
use tracing::{debug, warn};

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::security;

/// Result of walking one root directory.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Ledger files, sorted and deduplicated.
    pub files: Vec<PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
    /// Number of distinct directories read.
    pub directories_scanned: usize,
}

/// Walks directory trees looking for ledger files.
#[derive(Debug, Clone)]
pub struct FileDiscoverer {
    max_depth: usize,
    skip_hidden: bool,
    exclude_dirs: Vec<String>,
    extensions: Vec<String>,
}

impl Default for FileDiscoverer {
    fn default() -> Self {
        Self::new(&DiscoveryConfig::default())
    }
}

impl FileDiscoverer {
    pub fn new(config: &DiscoveryConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            skip_hidden: config.skip_hidden,
            exclude_dirs: config.exclude_dirs.clone(),
            extensions: config.extensions.clone(),
        }
    }

    /// Override the maximum directory depth.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Whether a path has one of the ledger extensions.
    pub fn is_ledger_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|known| known == ext))
    }

    /// Whether a directory below the root should be skipped by name.
    fn is_excluded_dir(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        (self.skip_hidden && name.starts_with('.')) || self.exclude_dirs.iter().any(|d| d == name)
    }

    /// Find all ledger files under `root`.
    pub fn discover(&self, root: &Path) -> Discovery {
        let mut visited: HashSet<PathBuf> = HashSet::new();
        let mut discovery = Discovery::default();
        let mut pending = VecDeque::from([(root.to_path_buf(), 0usize)]);

        while let Some((dir, depth)) = pending.pop_front() {
            self.scan_dir(&dir, depth, &mut visited, &mut pending, &mut discovery);
        }

        discovery.files.sort();
        discovery.files.dedup();
        debug!(
            root = %root.display(),
            files = discovery.files.len(),
            directories = discovery.directories_scanned,
            "Discovery finished"
        );
        discovery
    }

    fn scan_dir(
        &self,
        dir: &Path,
        depth: usize,
        visited: &mut HashSet<PathBuf>,
        pending: &mut VecDeque<(PathBuf, usize)>,
        discovery: &mut Discovery,
    ) {
        let real = match std::fs::canonicalize(dir) {
            Ok(real) => real,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "Cannot resolve directory, skipping");
                discovery.diagnostics.push(Diagnostic::warning(
                    DiagnosticKind::Io,
                    dir,
                    format!("cannot resolve directory: {e}"),
                ));
                return;
            }
        };

        if security::is_system_path(dir) || security::is_system_path(&real) {
            debug!(path = %dir.display(), "Skipping system directory");
            return;
        }
        if !visited.insert(real.clone()) {
            debug!(path = %dir.display(), real = %real.display(), "Directory already visited");
            return;
        }

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "Cannot read directory, skipping");
                discovery.diagnostics.push(Diagnostic::warning(
                    DiagnosticKind::Io,
                    dir,
                    format!("cannot read directory: {e}"),
                ));
                return;
            }
        };
        discovery.directories_scanned += 1;

        let mut children = Vec::new();
        for entry in entries {
            match entry {
                Ok(entry) => children.push(entry.path()),
                Err(e) => {
                    warn!(path = %dir.display(), error = %e, "Cannot read directory entry");
                    discovery.diagnostics.push(Diagnostic::warning(
                        DiagnosticKind::Io,
                        dir,
                        format!("cannot read directory entry: {e}"),
                    ));
                }
            }
        }
        children.sort();

        for path in children {
            // Follows symlinks; a dangling link fails here.
            let metadata = match std::fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Cannot stat entry, skipping");
                    discovery.diagnostics.push(Diagnostic::warning(
                        DiagnosticKind::Io,
                        &path,
                        format!("cannot stat entry: {e}"),
                    ));
                    continue;
                }
            };

            if metadata.is_dir() {
                if self.is_excluded_dir(&path) {
                    debug!(path = %path.display(), "Skipping excluded directory");
                    continue;
                }
                if depth >= self.max_depth {
                    warn!(
                        path = %path.display(),
                        max_depth = self.max_depth,
                        "Directory depth limit reached, not descending"
                    );
                    discovery.diagnostics.push(Diagnostic::warning(
                        DiagnosticKind::DepthLimit,
                        &path,
                        format!("directory depth limit {} reached", self.max_depth),
                    ));
                    continue;
                }
                pending.push_back((path, depth + 1));
            } else if metadata.is_file() && self.is_ledger_file(&path) {
                discovery.files.push(path);
            }
        }
    }
}
