//! Include resolution for a single root file.
//!
//! Every include target is resolved against the including file's directory,
//! checked lexically against the workspace root, bounded by depth, and only
//! then touched on disk. The canonical target is checked a second time so a
//! symlink inside the workspace cannot point the read somewhere else.
//! Included data is folded into the including file's builder at the position
//! of the directive.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, trace, warn};

use crate::BoxFuture;
use crate::builder::IndexBuilder;
use crate::cache::TokenCache;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::index::{IndexData, KnowledgeIndex};
use crate::security;
use crate::token::{Token, TokenKind, tokenize};

/// Outcome of indexing one root file together with everything it includes.
#[derive(Debug, Clone)]
pub struct FileIndex {
    pub path: PathBuf,
    /// `None` when the root file itself could not be read.
    pub index: Option<KnowledgeIndex>,
    /// Canonical paths of included files, each listed once, in first-seen order.
    pub included: Vec<PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
}

impl FileIndex {
    /// A root file that produced no index, with the reason.
    pub(crate) fn unindexed(path: PathBuf, diagnostic: Diagnostic) -> Self {
        Self {
            path,
            index: None,
            included: Vec::new(),
            diagnostics: vec![diagnostic],
        }
    }
}

/// Read a ledger file, synchronously below `async_threshold` bytes and
/// through `tokio::fs` at or above it. Invalid UTF-8 is replaced.
pub async fn read_ledger(path: &Path, async_threshold: u64) -> io::Result<String> {
    let len = std::fs::metadata(path)?.len();
    let bytes = if len >= async_threshold {
        trace!(path = %path.display(), len, "Async read");
        tokio::fs::read(path).await?
    } else {
        std::fs::read(path)?
    };
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Per-root-file include walker.
pub(crate) struct IncludeResolver {
    root: PathBuf,
    max_depth: usize,
    read_threshold: u64,
    cache: Arc<Mutex<TokenCache>>,
    included: Vec<PathBuf>,
    diagnostics: Vec<Diagnostic>,
}

impl IncludeResolver {
    /// `root` must already be canonical.
    pub(crate) fn new(
        root: PathBuf,
        max_depth: usize,
        read_threshold: u64,
        cache: Arc<Mutex<TokenCache>>,
    ) -> Self {
        Self {
            root,
            max_depth,
            read_threshold,
            cache,
            included: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Index `path` (depth 0) and everything reachable through its includes.
    pub(crate) async fn resolve(mut self, path: PathBuf) -> FileIndex {
        let data = self.index_file(&path, 0).await;
        FileIndex {
            path,
            index: data.map(KnowledgeIndex::from_data),
            included: self.included,
            diagnostics: self.diagnostics,
        }
    }

    fn index_file<'a>(
        &'a mut self,
        path: &'a Path,
        depth: usize,
    ) -> BoxFuture<'a, Option<IndexData>> {
        Box::pin(async move {
            let tokens = self.tokens_for(path).await?;
            let base = path.parent().map(Path::to_path_buf).unwrap_or_default();

            let mut builder = IndexBuilder::new();
            for token in tokens.iter() {
                if token.kind == TokenKind::IncludeDirective {
                    if let Some(included) = self.follow_include(token, &base, depth).await {
                        builder.absorb(&included);
                    }
                } else {
                    builder.apply(token);
                }
            }
            Some(builder.finish())
        })
    }

    async fn follow_include(
        &mut self,
        token: &Token,
        base: &Path,
        depth: usize,
    ) -> Option<IndexData> {
        let target = token.include_target()?;
        let candidate = if Path::new(target).is_absolute() {
            PathBuf::from(target)
        } else {
            base.join(target)
        };

        let resolved = match security::validate_include_path(&candidate, &self.root) {
            Ok(resolved) => resolved,
            Err(rejection) => {
                self.reject(&candidate, rejection);
                return None;
            }
        };

        if depth >= self.max_depth {
            warn!(
                path = %resolved.display(),
                depth,
                max_depth = self.max_depth,
                "Include depth limit reached, skipping"
            );
            self.diagnostics.push(Diagnostic::warning(
                DiagnosticKind::DepthLimit,
                &resolved,
                format!("include depth limit {} reached", self.max_depth),
            ));
            return None;
        }

        let canonical = match tokio::fs::canonicalize(&resolved).await {
            Ok(canonical) => canonical,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                error!(path = %resolved.display(), "Include target not found");
                self.diagnostics.push(Diagnostic::error(
                    DiagnosticKind::MissingInclude,
                    &resolved,
                    "include target not found",
                ));
                return None;
            }
            Err(e) => {
                warn!(path = %resolved.display(), error = %e, "Cannot resolve include target");
                self.diagnostics.push(Diagnostic::warning(
                    DiagnosticKind::Io,
                    &resolved,
                    format!("cannot resolve include target: {e}"),
                ));
                return None;
            }
        };

        // A symlink inside the workspace may still point outside it.
        if let Err(rejection) = security::validate_include_path(&canonical, &self.root) {
            self.reject(&resolved, rejection);
            return None;
        }

        debug!(path = %canonical.display(), depth = depth + 1, "Following include");
        let data = self.index_file(&canonical, depth + 1).await?;
        if !self.included.contains(&canonical) {
            self.included.push(canonical);
        }
        Some(data)
    }

    fn reject(&mut self, path: &Path, rejection: security::IncludeRejection) {
        warn!(path = %path.display(), reason = %rejection, "Include rejected");
        self.diagnostics.push(Diagnostic::warning(
            DiagnosticKind::Security,
            path,
            rejection.to_string(),
        ));
    }

    async fn tokens_for(&mut self, path: &Path) -> Option<Arc<Vec<Token>>> {
        let key = path.to_path_buf();
        let cached = self.cache.lock().await.get(&key);
        if let Some(tokens) = cached {
            trace!(path = %path.display(), "Token cache hit");
            return Some(tokens);
        }

        match read_ledger(path, self.read_threshold).await {
            Ok(content) => {
                let tokens = Arc::new(tokenize(&content));
                self.cache.lock().await.insert(key, Arc::clone(&tokens));
                Some(tokens)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read ledger file, skipping");
                self.diagnostics.push(Diagnostic::warning(
                    DiagnosticKind::Io,
                    path,
                    format!("cannot read file: {e}"),
                ));
                None
            }
        }
    }
}
