// src/lib.rs
// proxy-harness - lifecycle control for black-box tests against a reverse proxy

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod config;
pub mod error;
pub mod http;
pub mod identity;
pub mod logging;
pub mod readiness;
pub mod upstream;
pub mod workload;

pub use config::HarnessEnv;
pub use error::{HarnessError, Result};
pub use readiness::ReadinessPolicy;
pub use upstream::{CapturedRequest, MockUpstream, MockUpstreamConfig};
pub use workload::{
    DockerLauncher, Launcher, LocalLauncher, ManagedWorkload, WorkloadConfig, WorkloadState,
};
