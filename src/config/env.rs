// src/config/env.rs
// Environment-based configuration - single source of truth for all env vars

use super::{
    DEFAULT_DOCKER_BINARY, DEFAULT_IMAGE, DEFAULT_WORKLOAD_PORT, ENV_DOCKER_BINARY,
    ENV_DOCKER_NETWORK, ENV_IMAGE, ENV_PORT, ENV_READY_ATTEMPTS, ENV_READY_INTERVAL_MS,
    ENV_TESTER_NAME,
};
use crate::error::{HarnessError, Result};
use crate::readiness::ReadinessPolicy;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

/// Harness configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct HarnessEnv {
    /// Host the workload uses to reach the mock upstream (TESTER_NAME)
    pub tester_name: Option<String>,
    /// Network for workload containers (DOCKER_NETWORK)
    pub docker_network: Option<String>,
    /// Container runtime binary
    pub docker_binary: String,
    /// Workload image
    pub image: String,
    /// Port the workload listens on inside the network
    pub workload_port: u16,
    /// Readiness polling budget
    pub readiness: ReadinessPolicy,
}

impl Default for HarnessEnv {
    fn default() -> Self {
        Self {
            tester_name: None,
            docker_network: None,
            docker_binary: DEFAULT_DOCKER_BINARY.to_string(),
            image: DEFAULT_IMAGE.to_string(),
            workload_port: DEFAULT_WORKLOAD_PORT,
            readiness: ReadinessPolicy::default(),
        }
    }
}

impl HarnessEnv {
    /// Load configuration from the process environment.
    ///
    /// A `.env` file in the working directory (or a parent) is applied first
    /// when present; variables already set in the environment take precedence.
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "Loaded .env file");
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let readiness = ReadinessPolicy {
            max_attempts: parse_var(&read, ENV_READY_ATTEMPTS)?
                .unwrap_or(defaults.readiness.max_attempts),
            interval: parse_var::<u64, _>(&read, ENV_READY_INTERVAL_MS)?
                .map(Duration::from_millis)
                .unwrap_or(defaults.readiness.interval),
        };

        let env = Self {
            tester_name: read(ENV_TESTER_NAME),
            docker_network: read(ENV_DOCKER_NETWORK),
            docker_binary: read(ENV_DOCKER_BINARY).unwrap_or(defaults.docker_binary),
            image: read(ENV_IMAGE).unwrap_or(defaults.image),
            workload_port: parse_var(&read, ENV_PORT)?.unwrap_or(defaults.workload_port),
            readiness,
        };
        env.log_status();
        Ok(env)
    }

    /// Host for the mock upstream; fatal when unset
    pub fn upstream_host(&self) -> Result<&str> {
        self.tester_name
            .as_deref()
            .ok_or(HarnessError::MissingEnv(ENV_TESTER_NAME))
    }

    /// Network for workload containers; fatal when unset
    pub fn network(&self) -> Result<&str> {
        self.docker_network
            .as_deref()
            .ok_or(HarnessError::MissingEnv(ENV_DOCKER_NETWORK))
    }

    fn log_status(&self) {
        if self.tester_name.is_none() {
            warn!("{} not set - mock upstreams cannot be started", ENV_TESTER_NAME);
        }
        if self.docker_network.is_none() {
            warn!("{} not set - container workloads cannot be started", ENV_DOCKER_NETWORK);
        }
        debug!(
            image = %self.image,
            port = self.workload_port,
            attempts = self.readiness.max_attempts,
            interval_ms = self.readiness.interval.as_millis() as u64,
            "Harness configuration loaded"
        );
    }
}

fn parse_var<T, F>(read: &F, name: &'static str) -> Result<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match read(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| HarnessError::InvalidEnv { name, value: raw }),
    }
}
