// src/http.rs
// Shared HTTP client for readiness probes and test traffic

use std::time::Duration;

/// Per-request timeout for probes and test requests
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connect timeout; kept short so a dead workload fails a probe quickly
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Create the HTTP client used against workloads and upstreams.
///
/// Redirects are not followed so tests see the proxy's own responses, and
/// idle connections are not pooled so a killed workload never hands back a
/// stale keep-alive socket.
pub fn create_probe_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(PROBE_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(reqwest::redirect::Policy::none())
        .pool_max_idle_per_host(0)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Join a base URL and a path without doubling the slash
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
