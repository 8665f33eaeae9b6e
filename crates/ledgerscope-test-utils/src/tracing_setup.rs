//! Tracing initialisation for tests that do not go through `test-log`.
//!
//! The subscriber is installed at most once per process, so
//! [`init_test_tracing`] can be called from every test.

use tracing_subscriber::EnvFilter;

/// Install a subscriber that writes to the test-harness writer.
///
/// `RUST_LOG` wins; otherwise only warnings and errors are shown.
///
/// # Example
///
/// ```ignore
/// #[test]
/// fn discovers_files() {
///     ledgerscope_test_utils::tracing_setup::init_test_tracing();
///     // ...
/// }
/// ```
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
