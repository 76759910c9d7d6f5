// src/readiness.rs
// Bounded readiness polling that races against an early-exit check

use crate::error::{HarnessError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

/// How long and how often to poll before giving up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    /// Probes attempted before giving up
    pub max_attempts: u32,
    /// Sleep between failed probes
    pub interval: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            interval: Duration::from_millis(500),
        }
    }
}

impl ReadinessPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }
}

/// Poll `probe` until it reports ready.
///
/// `exited` is checked before every probe without blocking; if it yields an
/// exit code the loop stops with `ExitedEarly` instead of spending the rest
/// of the budget on a process that will never answer. Returns the 1-based
/// attempt that succeeded.
pub async fn poll_until_ready<E, P, F>(
    policy: &ReadinessPolicy,
    label: &str,
    mut exited: E,
    mut probe: P,
) -> Result<u32>
where
    E: FnMut() -> Option<i32>,
    P: FnMut() -> F,
    F: Future<Output = bool>,
{
    for attempt in 0..policy.max_attempts {
        info!("Wait for {}... ({}/{})", label, attempt, policy.max_attempts);

        if let Some(code) = exited() {
            return Err(HarnessError::ExitedEarly { code });
        }

        if probe().await {
            debug!(label, attempt = attempt + 1, "Ready");
            return Ok(attempt + 1);
        }

        if attempt + 1 < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    Err(HarnessError::NotReady {
        attempts: policy.max_attempts,
    })
}

/// True once `url` produces any HTTP response, whatever its status
pub async fn probe_responds(client: &reqwest::Client, url: &str) -> bool {
    match client.get(url).send().await {
        Ok(resp) => {
            debug!(url, status = resp.status().as_u16(), "Probe answered");
            true
        }
        Err(e) => {
            debug!(url, error = %e, "Probe failed");
            false
        }
    }
}
