//! Include resolution through the public loader API.

use std::path::PathBuf;

use ledgerscope_core::{DiagnosticKind, LedgerLoader, Severity};
use ledgerscope_test_utils::config::TestConfigBuilder;
use ledgerscope_test_utils::fixtures::LedgerTree;
use pretty_assertions::assert_eq;

fn count(outcome: &ledgerscope_core::LoadOutcome, kind: DiagnosticKind) -> usize {
    outcome.diagnostics.iter().filter(|d| d.kind == kind).count()
}

fn included(outcome: &ledgerscope_core::LoadOutcome) -> Vec<PathBuf> {
    let mut paths = outcome.files[0].included.clone();
    paths.sort();
    paths
}

// ── Depth bound ──────────────────────────────────────────────────────────

#[test_log::test(tokio::test)]
async fn test_mutual_include_terminates_at_depth_bound() {
    let tree = LedgerTree::new();
    let a = tree.write("a.journal", "include b.journal\npayee Alpha\n");
    let b = tree.write("b.journal", "include a.journal\npayee Beta\n");

    let config = TestConfigBuilder::new().include_depth(10).build();
    let outcome = LedgerLoader::new(&config).load_file(&a).await;

    let index = &outcome.index;
    assert!(index.payees().contains("Alpha"));
    assert!(index.payees().contains("Beta"));
    assert_eq!(included(&outcome), vec![a, b]);
    assert_eq!(count(&outcome, DiagnosticKind::DepthLimit), 1);
    assert_eq!(outcome.errors().count(), 0);
}

#[test_log::test(tokio::test)]
async fn test_include_chain_within_depth_is_followed() {
    let tree = LedgerTree::new();
    let main = tree.write("main.journal", "include one.journal\n");
    tree.write("one.journal", "include two.journal\naccount a:one\n");
    tree.write("two.journal", "include three.journal\naccount a:two\n");
    tree.write("three.journal", "account a:three\n");

    let config = TestConfigBuilder::new().include_depth(2).build();
    let outcome = LedgerLoader::new(&config).load_file(&main).await;

    let accounts = outcome.index.defined_accounts();
    assert!(accounts.contains("a:one"));
    assert!(accounts.contains("a:two"));
    assert!(!accounts.contains("a:three"));
    assert_eq!(count(&outcome, DiagnosticKind::DepthLimit), 1);
}

// ── Security ─────────────────────────────────────────────────────────────

#[test_log::test(tokio::test)]
async fn test_traversal_outside_root_is_rejected() {
    let tree = LedgerTree::new();
    tree.write("secret.journal", "account leaked:account\n");
    let main = tree.write(
        "books/main.journal",
        "include ../secret.journal\ninclude ../../etc/passwd\ninclude /etc/passwd\naccount assets:cash\n",
    );

    let outcome = LedgerLoader::new(&TestConfigBuilder::new().build())
        .load_file(&main)
        .await;

    assert_eq!(count(&outcome, DiagnosticKind::Security), 3);
    assert!(outcome.warnings().all(|d| d.kind == DiagnosticKind::Security));
    assert_eq!(outcome.errors().count(), 0);
    assert!(!outcome.index.accounts().contains("leaked:account"));
    assert!(outcome.index.accounts().contains("assets:cash"));
    assert!(outcome.files[0].included.is_empty());
}

#[cfg(unix)]
#[test_log::test(tokio::test)]
async fn test_symlink_escaping_root_is_rejected() {
    let tree = LedgerTree::new();
    tree.write("outside.journal", "account leaked:account\n");
    let main = tree.write("books/main.journal", "include link.journal\n");
    tree.symlink("outside.journal", "books/link.journal");

    let outcome = LedgerLoader::new(&TestConfigBuilder::new().build())
        .load_file(&main)
        .await;

    assert_eq!(count(&outcome, DiagnosticKind::Security), 1);
    assert!(outcome.index.accounts().is_empty());
}

// ── Missing targets ──────────────────────────────────────────────────────

#[test_log::test(tokio::test)]
async fn test_missing_include_does_not_stop_siblings() {
    let tree = LedgerTree::new();
    let main = tree.write(
        "main.journal",
        "include missing.journal\ninclude accounts.journal\npayee Grocer\n",
    );
    let accounts = tree.write("accounts.journal", "account assets:bank\n");

    let outcome = LedgerLoader::new(&TestConfigBuilder::new().build())
        .load_file(&main)
        .await;

    let errors: Vec<_> = outcome.errors().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, DiagnosticKind::MissingInclude);
    assert_eq!(errors[0].severity, Severity::Error);
    assert_eq!(errors[0].path, tree.path("missing.journal"));
    assert!(outcome.index.defined_accounts().contains("assets:bank"));
    assert!(outcome.index.payees().contains("Grocer"));
    assert_eq!(included(&outcome), vec![accounts]);
}

// ── Shapes ───────────────────────────────────────────────────────────────

#[test_log::test(tokio::test)]
async fn test_diamond_include_lists_shared_file_once() {
    let tree = LedgerTree::new();
    let main = tree.write("main.journal", "include left.journal\ninclude right.journal\n");
    let left = tree.write("left.journal", "include common.journal\naccount left:acct\n");
    let right = tree.write("right.journal", "include common.journal\naccount right:acct\n");
    let common = tree.write(
        "common.journal",
        "2024-01-01 Shared\n    expenses:shared  1 USD\n    assets:cash\n",
    );

    let outcome = LedgerLoader::new(&TestConfigBuilder::new().build())
        .load_file(&main)
        .await;

    assert_eq!(included(&outcome), vec![common, left, right]);
    assert!(outcome.diagnostics.is_empty());
    // Each inclusion of the shared file contributes its usage.
    assert_eq!(outcome.index.payee_usage().get("Shared"), Some(&2));
    assert_eq!(outcome.index.transaction_templates()["Shared"].len(), 1);
}

#[test_log::test(tokio::test)]
async fn test_include_in_subdirectory_resolves_relative_to_includer() {
    let tree = LedgerTree::new();
    let main = tree.write("main.journal", "include years/2024.journal\n");
    tree.write("years/2024.journal", "include ../prices/usd.journal\n");
    tree.write("prices/usd.journal", "commodity USD\n    format 1,000.00 USD\n");

    let outcome = LedgerLoader::new(&TestConfigBuilder::new().build())
        .load_file(&main)
        .await;

    assert!(outcome.diagnostics.is_empty());
    assert!(outcome.index.commodities().contains("USD"));
    assert_eq!(outcome.files[0].included.len(), 2);
}
