//! Workspace loading: discovery, batching, and order independence.

use std::path::PathBuf;

use ledgerscope_core::index::tag_value_key;
use ledgerscope_core::{DiagnosticKind, KnowledgeIndex, LedgerLoader};
use ledgerscope_test_utils::config::TestConfigBuilder;
use ledgerscope_test_utils::fixtures::LedgerTree;
use pretty_assertions::assert_eq;

const LONG_ACCOUNT: &str = "expenses:household:utilities:electricity:winter";

/// Seven root files. Odd files carry a long amount-bearing account that
/// moves the alignment column; every third file carries inline tags.
fn sample_tree() -> (LedgerTree, Vec<PathBuf>) {
    let tree = LedgerTree::new();
    let mut files = Vec::new();
    for (i, payee) in ["Grocer", "Landlord", "Cafe", "Grocer", "Utility", "Cafe", "Grocer"]
        .iter()
        .enumerate()
    {
        let amount = 10 + i;
        let tagged = i % 3 == 0;
        let mut content = format!(
            "account assets:bank\n\n2024-0{month}-1{i} {payee}{note}\n",
            month = i % 9 + 1,
            note = if tagged { "  ; trip:japan" } else { "" },
        );
        content.push_str(&format!(
            "    expenses:{payee}:item{i}  {amount}.00 USD{note}\n",
            note = if tagged { format!("  ; receipt:, batch:b{i}") } else { String::new() },
        ));
        if i % 2 == 1 {
            content.push_str(&format!("    {LONG_ACCOUNT}  {amount}.00 EUR\n"));
        }
        content.push_str("    assets:bank\n");
        files.push(tree.write(&format!("ledgers/file{i}.journal"), &content));
    }
    (tree, files)
}

fn assert_same_aggregates(a: &KnowledgeIndex, b: &KnowledgeIndex) {
    assert_eq!(a.accounts(), b.accounts());
    assert_eq!(a.payees(), b.payees());
    assert_eq!(a.commodities(), b.commodities());
    assert_eq!(a.account_usage(), b.account_usage());
    assert_eq!(a.payee_usage(), b.payee_usage());
    assert_eq!(a.payee_account_pair_usage(), b.payee_account_pair_usage());
    assert_eq!(a.commodity_usage(), b.commodity_usage());
    assert_eq!(a.tags(), b.tags());
    assert_eq!(a.tag_values(), b.tag_values());
    assert_eq!(a.tag_usage(), b.tag_usage());
    assert_eq!(a.tag_value_usage(), b.tag_value_usage());
    assert_eq!(a.last_date(), b.last_date());
    assert_eq!(a.formatting_profile(), b.formatting_profile());
}

// ── Batch invariance ─────────────────────────────────────────────────────

#[test_log::test(tokio::test)]
async fn test_batch_size_and_order_do_not_change_aggregates() {
    let (tree, files) = sample_tree();
    let root = tree.root();

    let baseline = LedgerLoader::new(&TestConfigBuilder::new().batch_size(1).build())
        .load_files(&files, root)
        .await;
    assert_eq!(baseline.files.len(), files.len());

    let mut reversed = files.clone();
    reversed.reverse();
    for batch_size in [2, 3, 5, 64] {
        let loader = LedgerLoader::new(&TestConfigBuilder::new().batch_size(batch_size).build());
        let forward = loader.load_files(&files, root).await;
        let backward = loader.load_files(&reversed, root).await;
        assert_same_aggregates(&baseline.index, &forward.index);
        assert_same_aggregates(&baseline.index, &backward.index);
    }

    let index = &baseline.index;
    assert_eq!(index.payee_usage().get("Grocer"), Some(&3));
    assert_eq!(index.account_usage().get("assets:bank"), Some(&7));
    assert_eq!(index.account_usage().get(LONG_ACCOUNT), Some(&3));
    assert_eq!(index.commodity_usage().get("EUR"), Some(&3));
    assert_eq!(index.tag_usage().get("trip"), Some(&3));
    assert_eq!(index.tag_usage().get("receipt"), Some(&3));
    assert_eq!(index.tag_value_usage().get(&tag_value_key("trip", "japan")), Some(&3));
    assert_eq!(index.tag_values()["batch"].len(), 3);

    let profile = index.formatting_profile();
    assert!(!profile.is_default_alignment);
    assert_eq!(profile.max_account_name_length, LONG_ACCOUNT.len());
    assert_eq!(profile.amount_alignment_column, 4 + LONG_ACCOUNT.len() + 2);
    assert!(profile.amount_alignment_column > 40);
}

#[test_log::test(tokio::test)]
async fn test_results_follow_input_order() {
    let (tree, files) = sample_tree();
    let outcome = LedgerLoader::new(&TestConfigBuilder::new().batch_size(3).build())
        .load_files(&files, tree.root())
        .await;

    let paths: Vec<PathBuf> = outcome.files.iter().map(|f| f.path.clone()).collect();
    assert_eq!(paths, files);
}

// ── Reading ──────────────────────────────────────────────────────────────

#[test_log::test(tokio::test)]
async fn test_async_and_sync_reads_build_the_same_index() {
    let (tree, files) = sample_tree();
    let sync_config = TestConfigBuilder::new().async_read_threshold(u64::MAX).build();
    let async_config = TestConfigBuilder::new().async_read_threshold(0).build();
    let sync_outcome = LedgerLoader::new(&sync_config)
        .load_files(&files, tree.root())
        .await;
    let async_outcome = LedgerLoader::new(&async_config)
        .load_files(&files, tree.root())
        .await;
    assert_eq!(sync_outcome.index, async_outcome.index);
}

#[test_log::test(tokio::test)]
async fn test_tiny_token_cache_still_indexes_everything() {
    let tree = LedgerTree::new();
    let main = tree.write(
        "main.journal",
        "include a.journal\ninclude b.journal\ninclude c.journal\ninclude a.journal\n",
    );
    tree.write("a.journal", "account x:a\n");
    tree.write("b.journal", "account x:b\n");
    tree.write("c.journal", "account x:c\n");

    let loader = LedgerLoader::new(&TestConfigBuilder::new().token_cache_capacity(1).build());
    let outcome = loader.load_file(&main).await;
    assert_eq!(outcome.index.defined_accounts().len(), 3);
    assert_eq!(outcome.files[0].included.len(), 3);
}

// ── Workspaces ───────────────────────────────────────────────────────────

#[test_log::test(tokio::test)]
async fn test_workspace_load_discovers_and_indexes() {
    let tree = LedgerTree::new();
    tree.write(
        "2023.journal",
        "2023-12-31 Bakery\n    expenses:bread  3 EUR\n    assets:cash\n",
    );
    tree.write(
        "sub/2024.ledger",
        "2024-02-01 Bakery\n    expenses:bread  4 EUR\n    assets:cash\n",
    );
    tree.write("node_modules/ignored.journal", "payee Ignored\n");
    tree.write("notes.txt", "payee NotALedger\n");

    let outcome = LedgerLoader::new(&TestConfigBuilder::new().build())
        .load_workspace(tree.root())
        .await;

    assert_eq!(outcome.files.len(), 2);
    assert_eq!(outcome.index.payee_usage().get("Bakery"), Some(&2));
    assert!(!outcome.index.payees().contains("Ignored"));
    assert!(!outcome.index.payees().contains("NotALedger"));
    assert_eq!(outcome.index.last_date(), Some("2024-02-01"));
    assert_eq!(outcome.indexed_paths().len(), 2);
}

#[cfg(unix)]
#[test_log::test(tokio::test)]
async fn test_workspace_with_symlink_cycle_terminates() {
    let tree = LedgerTree::new();
    tree.write("a/main.journal", "payee Loop\n");
    tree.mkdir("a/b");
    tree.symlink("a", "a/b/back");

    let outcome = LedgerLoader::new(&TestConfigBuilder::new().build())
        .load_workspace(tree.root())
        .await;

    assert_eq!(outcome.files.len(), 1);
    assert!(outcome.index.payees().contains("Loop"));
    assert_eq!(
        outcome
            .diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::DepthLimit)
            .count(),
        0
    );
}

#[test_log::test(tokio::test)]
async fn test_workspace_depth_limit_is_a_warning() {
    let tree = LedgerTree::new();
    tree.write("top.journal", "payee Top\n");
    tree.write("one/two/deep.journal", "payee Deep\n");

    let config = TestConfigBuilder::new().discovery_depth(1).build();
    let outcome = LedgerLoader::new(&config).load_workspace(tree.root()).await;

    assert!(outcome.index.payees().contains("Top"));
    assert!(!outcome.index.payees().contains("Deep"));
    assert_eq!(outcome.warnings().count(), 1);
    assert_eq!(outcome.errors().count(), 0);
}

#[test_log::test(tokio::test)]
async fn test_discovery_rules_come_from_config() {
    let tree = LedgerTree::new();
    tree.write(".hidden/visible.journal", "payee Hidden\n");
    tree.write("archive/old.journal", "payee Archived\n");
    tree.write("node_modules/pkg.journal", "payee Package\n");

    let config = TestConfigBuilder::new()
        .skip_hidden(false)
        .exclude_dirs(&["archive"])
        .build();
    let outcome = LedgerLoader::new(&config).load_workspace(tree.root()).await;

    let payees = outcome.index.payees();
    assert!(payees.contains("Hidden"));
    assert!(payees.contains("Package"));
    assert!(!payees.contains("Archived"));
}
