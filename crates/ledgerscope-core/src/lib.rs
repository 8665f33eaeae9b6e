#![deny(unsafe_code)]

//! ledgerscope core: knowledge indexing for plain-text ledgers.
//!
//! Discovers ledger files under a root, tokenizes them, follows include
//! directives inside a security boundary, and folds everything into one
//! immutable [`KnowledgeIndex`] together with the formatting profile derived
//! from it. Nothing here fails hard: problems come back as [`Diagnostic`]s
//! next to whatever could still be indexed.

use std::future::Future;
use std::pin::Pin;

/// A type-erased, `Send`-safe, boxed future.
///
/// Used where an async function recurses into itself, which needs a
/// concrete, sized return type.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Token stream to per-file index data.
pub mod builder;
/// Bounded token cache shared by include resolution within one load.
pub mod cache;
/// Structured warnings and errors.
pub mod diagnostics;
/// Recursive ledger file discovery.
pub mod discovery;
/// Include directive resolution.
pub mod include;
/// The knowledge index snapshot and its queries.
pub mod index;
/// Batched multi-file loading.
pub mod loader;
/// Merge algebra over partial indices.
pub(crate) mod merge;
/// Amount alignment derived from an index.
pub mod profile;
/// Path containment and system directory checks.
pub mod security;
/// Transaction templates.
pub mod template;
/// Line tokenizer.
pub mod token;

pub use builder::{build_index, build_index_from_str};
pub use cache::{BoundedCache, TokenCache};
pub use diagnostics::{Diagnostic, DiagnosticKind, Severity};
pub use discovery::{Discovery, FileDiscoverer};
pub use include::{FileIndex, read_ledger};
pub use index::{IndexSummary, KnowledgeIndex};
pub use loader::{LedgerLoader, LoadOutcome};
pub use profile::FormattingProfile;
pub use security::IncludeRejection;
pub use template::{MAX_TEMPLATES_PER_PAYEE, Template, TemplatePosting};
pub use token::{Token, TokenKind, tokenize};
