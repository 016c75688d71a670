//! Logging initialization. IOx builds this out of `trogging`/`logfmt` wrapping
//! `tracing-subscriber`; neither of those is part of this workspace, so the coordinator talks to
//! `tracing-subscriber` directly, the same crate they wrap.
use crate::config::LoggingConfig;
use observability_deps::tracing;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Installs the global `tracing` subscriber. Must be called exactly once, before any other
/// crate's `tracing` macros fire.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        // A subscriber is already installed, e.g. a prior call in the same test binary.
        tracing::debug!("tracing subscriber already installed, skipping");
    }
}
