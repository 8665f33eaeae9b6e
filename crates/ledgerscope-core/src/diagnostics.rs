//! Structured warnings and errors collected while discovering and indexing.
//!
//! Nothing in the indexing pipeline aborts on a bad file; every problem is
//! recorded here and returned next to whatever index could still be built.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A file or directory could not be read.
    Io,
    /// An include escaped the workspace root or targeted a system directory.
    Security,
    /// An include target does not exist.
    MissingInclude,
    /// Directory or include recursion hit its configured bound.
    DepthLimit,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::Io => write!(f, "io"),
            DiagnosticKind::Security => write!(f, "security"),
            DiagnosticKind::MissingInclude => write!(f, "missing-include"),
            DiagnosticKind::DepthLimit => write!(f, "depth-limit"),
        }
    }
}

/// A single recorded problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    /// The file or directory the problem concerns.
    pub path: PathBuf,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(kind: DiagnosticKind, path: &Path, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    pub fn error(kind: DiagnosticKind, path: &Path, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}: {}",
            self.severity,
            self.kind,
            self.path.display(),
            self.message
        )
    }
}
