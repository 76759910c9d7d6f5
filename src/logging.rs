// src/logging.rs
// tracing subscriber setup for the binary and for tests

use tracing_subscriber::{EnvFilter, fmt};

/// Default filter when RUST_LOG is unset
pub const DEFAULT_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber, logging to stderr
pub fn init() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}

/// Install a subscriber that writes through the test harness capture.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(env_filter())
        .with_test_writer()
        .try_init();
}
