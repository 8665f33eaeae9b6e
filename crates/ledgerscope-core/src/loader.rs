//! Batched loading of many root files into one knowledge index.
//!
//! Root files are indexed in fixed-size chunks on a [`JoinSet`]. Each task
//! owns its own include resolver and produces a [`FileIndex`]; the shared
//! accumulator is only touched after a chunk has fully drained, and chunk
//! results are folded in input order so the combined index does not depend
//! on which task finished first.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ledgerscope_config::AppConfig;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::cache::TokenCache;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Severity};
use crate::discovery::{Discovery, FileDiscoverer};
use crate::include::{FileIndex, IncludeResolver};
use crate::index::KnowledgeIndex;
use crate::merge::IndexAccumulator;

/// Everything produced by one load.
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    /// Combined index of every root file that could be read.
    pub index: KnowledgeIndex,
    /// Per-root-file results in input order.
    pub files: Vec<FileIndex>,
    /// Discovery diagnostics followed by per-file diagnostics.
    pub diagnostics: Vec<Diagnostic>,
}

impl LoadOutcome {
    fn failed(diagnostic: Diagnostic) -> Self {
        Self {
            index: KnowledgeIndex::empty(),
            files: Vec::new(),
            diagnostics: vec![diagnostic],
        }
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    /// True when no file produced any index at all.
    pub fn is_empty(&self) -> bool {
        self.files.iter().all(|f| f.index.is_none())
    }

    /// Every root and included file that was indexed, sorted and deduplicated.
    pub fn indexed_paths(&self) -> Vec<&Path> {
        let mut paths: Vec<&Path> = self
            .files
            .iter()
            .filter(|f| f.index.is_some())
            .flat_map(|f| {
                std::iter::once(f.path.as_path()).chain(f.included.iter().map(PathBuf::as_path))
            })
            .collect();
        paths.sort();
        paths.dedup();
        paths
    }
}

/// Loads ledger files according to an [`AppConfig`].
#[derive(Debug, Clone)]
pub struct LedgerLoader {
    config: Arc<AppConfig>,
}

impl LedgerLoader {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            config: Arc::new(config.clone()),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Index a single file; its directory is the workspace root.
    pub async fn load_file(&self, path: &Path) -> LoadOutcome {
        let root = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        self.load_files(&[path.to_path_buf()], root).await
    }

    /// Discover every ledger file under `root` and index them all.
    pub async fn load_workspace(&self, root: &Path) -> LoadOutcome {
        let root = match tokio::fs::canonicalize(root).await {
            Ok(root) => root,
            Err(e) => return Self::unreadable_root(root, e),
        };

        let discoverer = FileDiscoverer::new(&self.config.discovery);
        let walk_root = root.clone();
        let walk = tokio::task::spawn_blocking(move || discoverer.discover(&walk_root));
        let discovery = match walk.await {
            Ok(discovery) => discovery,
            Err(e) => {
                error!(root = %root.display(), error = %e, "Discovery task failed");
                Discovery::default()
            }
        };
        info!(root = %root.display(), count = discovery.files.len(), "Discovered ledger files");

        let mut outcome = self.load_files(&discovery.files, &root).await;
        outcome.diagnostics.splice(0..0, discovery.diagnostics);
        outcome
    }

    /// Index `paths` with includes confined to `root`.
    pub async fn load_files(&self, paths: &[PathBuf], root: &Path) -> LoadOutcome {
        let root = match tokio::fs::canonicalize(root).await {
            Ok(root) => root,
            Err(e) => return Self::unreadable_root(root, e),
        };

        let loader = &self.config.loader;
        let cache = Arc::new(Mutex::new(TokenCache::new(loader.token_cache_capacity)));
        let batch_size = loader.batch_size.max(1);

        let mut accumulator = IndexAccumulator::new();
        let mut files = Vec::with_capacity(paths.len());
        let mut diagnostics = Vec::new();

        for (batch, chunk) in paths.chunks(batch_size).enumerate() {
            let mut tasks = JoinSet::new();
            for (offset, path) in chunk.iter().enumerate() {
                let resolver = IncludeResolver::new(
                    root.clone(),
                    self.config.includes.max_depth,
                    loader.async_read_threshold_bytes,
                    Arc::clone(&cache),
                );
                let path = path.clone();
                tasks.spawn(async move { (offset, index_root_file(resolver, path).await) });
            }

            for file in drain_chunk(tasks, chunk).await {
                if let Some(index) = &file.index {
                    accumulator.fold(index);
                }
                diagnostics.extend(file.diagnostics.iter().cloned());
                files.push(file);
            }
            debug!(batch, count = chunk.len(), "Batch folded");
        }

        let (hits, misses) = cache.lock().await.stats();
        let outcome = LoadOutcome {
            index: accumulator.finish(),
            files,
            diagnostics,
        };
        info!(
            files = outcome.files.len(),
            warnings = outcome.warnings().count(),
            errors = outcome.errors().count(),
            cache_hits = hits,
            cache_misses = misses,
            "Load finished"
        );
        outcome
    }

    fn unreadable_root(root: &Path, e: std::io::Error) -> LoadOutcome {
        warn!(root = %root.display(), error = %e, "Cannot resolve workspace root");
        LoadOutcome::failed(Diagnostic::error(
            DiagnosticKind::Io,
            root,
            format!("cannot resolve workspace root: {e}"),
        ))
    }
}

/// Wait for every task of a chunk and return one result per input path,
/// in input order.
///
/// A task that panicked or was cancelled leaves a gap; its file gets an
/// entry carrying an error diagnostic instead.
async fn drain_chunk(mut tasks: JoinSet<(usize, FileIndex)>, chunk: &[PathBuf]) -> Vec<FileIndex> {
    let mut finished = BTreeMap::new();
    let mut failures = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((offset, file)) => {
                finished.insert(offset, file);
            }
            Err(e) => {
                error!(error = %e, "Indexing task failed");
                failures.push(e.to_string());
            }
        }
    }

    chunk
        .iter()
        .enumerate()
        .map(|(offset, path)| {
            finished.remove(&offset).unwrap_or_else(|| {
                let reason = failures.join("; ");
                let diagnostic = Diagnostic::error(
                    DiagnosticKind::Io,
                    path,
                    format!("indexing task failed: {reason}"),
                );
                FileIndex::unindexed(path.clone(), diagnostic)
            })
        })
        .collect()
}

/// Canonicalize a root file so it shares cache keys with include targets.
async fn index_root_file(resolver: IncludeResolver, path: PathBuf) -> FileIndex {
    match tokio::fs::canonicalize(&path).await {
        Ok(canonical) => resolver.resolve(canonical).await,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read ledger file, skipping");
            let diagnostic = Diagnostic::warning(
                DiagnosticKind::Io,
                &path,
                format!("cannot read file: {e}"),
            );
            FileIndex::unindexed(path, diagnostic)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_file_uses_parent_as_root() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("main.journal");
        std::fs::write(&path, "2024-01-02 Grocer\n    expenses:food  10 USD\n    assets:cash\n")
            .unwrap();

        let outcome = LedgerLoader::new(&AppConfig::default()).load_file(&path).await;
        assert!(!outcome.is_empty());
        assert!(outcome.diagnostics.is_empty());
        assert!(outcome.index.payees().contains("Grocer"));
        assert_eq!(outcome.files.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_root_file_is_reported() {
        let tmp = TempDir::new().unwrap();
        let outcome = LedgerLoader::new(&AppConfig::default())
            .load_file(&tmp.path().join("nope.journal"))
            .await;
        assert!(outcome.is_empty());
        assert_eq!(outcome.warnings().count(), 1);
        assert_eq!(outcome.errors().count(), 0);
    }

    #[tokio::test]
    async fn test_missing_workspace_root_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let outcome = LedgerLoader::new(&AppConfig::default())
            .load_workspace(&tmp.path().join("gone"))
            .await;
        assert!(outcome.is_empty());
        assert_eq!(outcome.errors().count(), 1);
        assert!(outcome.index.is_empty());
    }

    #[tokio::test]
    async fn test_failed_task_is_reported_in_place() {
        let chunk = vec![
            PathBuf::from("/books/ok.journal"),
            PathBuf::from("/books/bad.journal"),
        ];
        let mut tasks = JoinSet::new();

        let ok_path = chunk[0].clone();
        tasks.spawn(async move {
            let file = FileIndex {
                path: ok_path,
                index: Some(KnowledgeIndex::empty()),
                included: Vec::new(),
                diagnostics: Vec::new(),
            };
            (0, file)
        });
        let bad_path = chunk[1].clone();
        let fail = true;
        tasks.spawn(async move {
            if fail {
                panic!("tokenizer blew up");
            }
            let diagnostic = Diagnostic::warning(DiagnosticKind::Io, &bad_path, "unreachable");
            (1, FileIndex::unindexed(bad_path, diagnostic))
        });

        let files = drain_chunk(tasks, &chunk).await;
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, chunk[0]);
        assert!(files[0].index.is_some());
        assert!(files[0].diagnostics.is_empty());
        assert_eq!(files[1].path, chunk[1]);
        assert!(files[1].index.is_none());
        assert_eq!(files[1].diagnostics.len(), 1);
        assert_eq!(files[1].diagnostics[0].severity, Severity::Error);
        assert_eq!(files[1].diagnostics[0].kind, DiagnosticKind::Io);
        assert!(files[1].diagnostics[0].message.contains("indexing task failed"));
    }

    #[tokio::test]
    async fn test_empty_workspace() {
        let tmp = TempDir::new().unwrap();
        let outcome = LedgerLoader::new(&AppConfig::default())
            .load_workspace(tmp.path())
            .await;
        assert!(outcome.files.is_empty());
        assert!(outcome.is_empty());
        assert!(outcome.diagnostics.is_empty());
    }
}
