// src/config/mod.rs
// Configuration and shared constants

pub mod env;

pub use env::HarnessEnv;

/// Host the mock upstream is reachable at from the workload (TESTER_NAME)
pub const ENV_TESTER_NAME: &str = "TESTER_NAME";

/// Network the workload container joins (DOCKER_NETWORK)
pub const ENV_DOCKER_NETWORK: &str = "DOCKER_NETWORK";

/// Container image override (PROXY_HARNESS_IMAGE)
pub const ENV_IMAGE: &str = "PROXY_HARNESS_IMAGE";

/// Container runtime binary override (PROXY_HARNESS_DOCKER)
pub const ENV_DOCKER_BINARY: &str = "PROXY_HARNESS_DOCKER";

/// Port the workload's HTTP listener is reachable on (PROXY_HARNESS_PORT)
pub const ENV_PORT: &str = "PROXY_HARNESS_PORT";

/// Readiness attempt budget override (PROXY_HARNESS_READY_ATTEMPTS)
pub const ENV_READY_ATTEMPTS: &str = "PROXY_HARNESS_READY_ATTEMPTS";

/// Readiness interval override in milliseconds (PROXY_HARNESS_READY_INTERVAL_MS)
pub const ENV_READY_INTERVAL_MS: &str = "PROXY_HARNESS_READY_INTERVAL_MS";

pub const DEFAULT_IMAGE: &str = "sample-nginx:latest";
pub const DEFAULT_DOCKER_BINARY: &str = "docker";
pub const DEFAULT_WORKLOAD_PORT: u16 = 80;

/// Upstream address nobody listens on, so proxied requests fail with a bad gateway
pub const UNREACHABLE_UPSTREAM: &str = "localhost:9999";
