//! Shared helpers for tests across the query coordinator workspace.
#![warn(missing_debug_implementations, clippy::explicit_iter_loop, clippy::use_self)]

use std::sync::Once;

#[cfg(feature = "future_timeout")]
pub mod timeout;

static LOG_SETUP: Once = Once::new();

/// Enables `tracing` output for tests, gated by the `RUST_LOG` env var, exactly once per
/// process. Safe to call from every test that wants log output; subsequent calls are no-ops.
pub fn maybe_start_logging() {
    LOG_SETUP.call_once(|| {
        let _ = dotenvy::dotenv();
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Returns a fresh temporary directory that is removed when the returned guard is dropped.
pub fn tmp_dir() -> std::io::Result<tempfile::TempDir> {
    tempfile::Builder::new().prefix("query-coordinator-").tempdir()
}
