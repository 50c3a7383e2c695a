//! Logging initialization.

use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber. The filter defaults to
/// `taskwheel=info` and can be overridden through `RUST_LOG`.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "taskwheel=info".into()),
        )
        .init();
}
