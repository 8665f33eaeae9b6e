//! Fuzz target for the journal tokenizer and knowledge builder.
//!
//! Run with: cargo +nightly fuzz run fuzz_journal_index
//!
//! Any text must tokenize to one token per line and index without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let tokens = ledgerscope_core::tokenize(&text);
    assert_eq!(tokens.len(), text.lines().count());

    let index = ledgerscope_core::build_index(&tokens);
    let profile = index.formatting_profile();
    assert!(profile.amount_alignment_column >= ledgerscope_core::profile::MIN_ALIGNMENT_COLUMN);
    let _ = index.merge(&index).summary();
});
