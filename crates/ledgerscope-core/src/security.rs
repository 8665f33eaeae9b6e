//! Path security checks for include resolution and discovery.
//!
//! Include targets are normalised lexically and checked against the
//! workspace root and a list of operating-system directories before anything
//! on disk is touched.

use std::path::{Component, Path, PathBuf};

/// Operating-system directories that are never read or scanned.
pub const SYSTEM_DIRECTORIES: &[&str] = &[
    "/bin",
    "/boot",
    "/dev",
    "/etc",
    "/lib",
    "/lib64",
    "/proc",
    "/sbin",
    "/sys",
    "/usr",
    "/var/log",
    "/var/run",
    "/System",
    "C:\\Windows",
    "C:\\Program Files",
    "C:\\Program Files (x86)",
];

/// Why an include target was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IncludeRejection {
    #[error("include escapes the workspace root {}: {}", .root.display(), .path.display())]
    OutsideWorkspace { path: PathBuf, root: PathBuf },

    #[error("include targets a system directory: {}", .0.display())]
    SystemDirectory(PathBuf),
}

/// Resolve `.` and `..` components without touching the file system.
///
/// `..` never climbs above the root of an absolute path.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => normalized.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                let at_root = normalized
                    .components()
                    .next_back()
                    .is_none_or(|last| matches!(last, Component::RootDir | Component::Prefix(_)));
                if at_root {
                    if !normalized.has_root() {
                        normalized.push("..");
                    }
                } else if normalized.ends_with("..") {
                    normalized.push("..");
                } else {
                    normalized.pop();
                }
            }
            Component::Normal(part) => normalized.push(part),
        }
    }
    normalized
}

/// Whether `path` lies inside one of [`SYSTEM_DIRECTORIES`].
pub fn is_system_path(path: &Path) -> bool {
    SYSTEM_DIRECTORIES
        .iter()
        .any(|dir| path.starts_with(Path::new(dir)))
}

/// Check a resolved include target against the workspace root.
///
/// Returns the normalised path on success.
pub fn validate_include_path(path: &Path, root: &Path) -> Result<PathBuf, IncludeRejection> {
    let normalized = normalize_path(path);
    if is_system_path(&normalized) {
        return Err(IncludeRejection::SystemDirectory(normalized));
    }
    let root = normalize_path(root);
    if !normalized.starts_with(&root) {
        return Err(IncludeRejection::OutsideWorkspace {
            path: normalized,
            root,
        });
    }
    Ok(normalized)
}
