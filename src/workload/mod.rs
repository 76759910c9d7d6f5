// src/workload/mod.rs
// Managed workload: the proxy under test running as an external process
//
// Lifecycle: Starting -> Running -> Ready -> Exited. The reaper task owns
// the child process and is the only producer of `Exited`.

mod launcher;
mod reaper;

pub use launcher::{DockerLauncher, Launcher, LocalLauncher, UPSTREAM_ADDR_VAR, WORKLOAD_NAME_VAR};
pub use reaper::UNKNOWN_EXIT_CODE;

use crate::config::{HarnessEnv, UNREACHABLE_UPSTREAM};
use crate::error::{HarnessError, Result};
use crate::http::{create_probe_client, join_url};
use crate::identity;
use crate::readiness::{ReadinessPolicy, poll_until_ready, probe_responds};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Liveness endpoint polled by `await_ready`
pub const HEALTH_PATH: &str = "/health";

/// Observable lifecycle state of a workload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadState {
    Starting,
    Running,
    Ready,
    /// Terminal; carries the process exit code
    Exited(i32),
}

impl WorkloadState {
    pub fn is_exited(&self) -> bool {
        matches!(self, Self::Exited(_))
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Exited(code) => Some(*code),
            _ => None,
        }
    }
}

/// Launch parameters for a workload
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    /// Upstream the proxy forwards to; None or empty selects an address nobody listens on
    pub upstream_address: Option<String>,
    /// Readiness budget used by `await_ready_default`
    pub readiness: ReadinessPolicy,
    /// How long `shutdown` waits for a clean exit before killing the process
    pub shutdown_grace: Duration,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            upstream_address: None,
            readiness: ReadinessPolicy::default(),
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

impl WorkloadConfig {
    pub fn from_env(env: &HarnessEnv) -> Self {
        Self {
            readiness: env.readiness,
            ..Self::default()
        }
    }

    pub fn with_upstream(mut self, address: impl Into<String>) -> Self {
        self.upstream_address = Some(address.into());
        self
    }

    /// Upstream address actually passed to the workload
    pub fn resolved_upstream(&self) -> &str {
        self.upstream_address
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .unwrap_or(UNREACHABLE_UPSTREAM)
    }
}

/// Handle to a running workload process
pub struct ManagedWorkload {
    identity: String,
    url: String,
    config: WorkloadConfig,
    launcher: Arc<dyn Launcher>,
    state_tx: Arc<watch::Sender<WorkloadState>>,
    state_rx: watch::Receiver<WorkloadState>,
    kill_tx: Option<oneshot::Sender<()>>,
    reaper: Option<JoinHandle<()>>,
    client: reqwest::Client,
}

impl ManagedWorkload {
    /// Launch a workload without waiting for it to become ready.
    ///
    /// Must be called from within a tokio runtime; the reaper runs as a task.
    pub async fn start<L>(config: WorkloadConfig, launcher: L) -> Result<Self>
    where
        L: Launcher + 'static,
    {
        let launcher: Arc<dyn Launcher> = Arc::new(launcher);
        let identity = identity::resource_name(launcher.name_prefix());
        let upstream = config.resolved_upstream().to_string();

        let std_cmd = launcher.command(&identity, &upstream);
        let program = std_cmd.get_program().to_string_lossy().into_owned();
        let mut cmd = Command::from(std_cmd);
        cmd.kill_on_drop(true);

        let (state_tx, state_rx) = watch::channel(WorkloadState::Starting);
        let state_tx = Arc::new(state_tx);

        let child = cmd
            .spawn()
            .map_err(|source| HarnessError::Launch { program, source })?;
        info!(
            identity = %identity,
            pid = ?child.id(),
            upstream = %upstream,
            "Workload started"
        );
        reaper::advance(&state_tx, WorkloadState::Running);

        let (kill_tx, kill_rx) = oneshot::channel();
        let reaper = reaper::spawn(child, identity.clone(), state_tx.clone(), kill_rx);
        let url = launcher.base_url(&identity);

        Ok(Self {
            identity,
            url,
            config,
            launcher,
            state_tx,
            state_rx,
            kill_tx: Some(kill_tx),
            reaper: Some(reaper),
            client: create_probe_client(),
        })
    }

    /// Launch the containerized proxy on DOCKER_NETWORK
    pub async fn start_docker(config: WorkloadConfig, env: &HarnessEnv) -> Result<Self> {
        let launcher = DockerLauncher::from_env(env)?;
        Self::start(config, launcher).await
    }

    /// Unique name of the external resource
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Base URL of the workload, derived from its identity
    pub fn url(&self) -> &str {
        &self.url
    }

    /// HTTP client for test traffic against this workload
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn state(&self) -> WorkloadState {
        *self.state_rx.borrow()
    }

    /// Exit code if the process has already exited; never blocks
    pub fn exit_code(&self) -> Option<i32> {
        self.state_rx.borrow().exit_code()
    }

    /// Wait until the process exits on its own
    pub async fn wait_exit(&self) -> i32 {
        let mut rx = self.state_rx.clone();
        match rx.wait_for(WorkloadState::is_exited).await {
            Ok(state) => state.exit_code().unwrap_or(UNKNOWN_EXIT_CODE),
            Err(_) => UNKNOWN_EXIT_CODE,
        }
    }

    /// GET `path` on the workload
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self.client.get(join_url(&self.url, path)).send().await?)
    }

    /// Poll the health endpoint until it answers.
    ///
    /// Any HTTP response counts as ready, whatever its status. Fails with
    /// `ExitedEarly` as soon as the process is seen to have exited, and with
    /// `NotReady` once `max_attempts` probes went unanswered.
    pub async fn await_ready(&self, max_attempts: u32) -> Result<u32> {
        let policy = ReadinessPolicy {
            max_attempts,
            ..self.config.readiness
        };
        let health_url = join_url(&self.url, HEALTH_PATH);

        let result = poll_until_ready(
            &policy,
            &self.identity,
            || self.exit_code(),
            || probe_responds(&self.client, &health_url),
        )
        .await;

        match &result {
            Ok(attempt) => {
                reaper::advance(&self.state_tx, WorkloadState::Ready);
                info!(identity = %self.identity, attempt, "Workload ready");
            }
            Err(HarnessError::ExitedEarly { code }) => {
                error!(identity = %self.identity, exit_code = code, "Workload exited unexpectedly");
            }
            Err(e) => {
                warn!(identity = %self.identity, error = %e, "Workload did not become ready");
            }
        }
        result
    }

    /// `await_ready` with the configured attempt budget
    pub async fn await_ready_default(&self) -> Result<u32> {
        self.await_ready(self.config.readiness.max_attempts).await
    }

    /// Stop the workload and wait until the reaper confirms it exited.
    ///
    /// Consumes the handle. Safe when the process already exited on its own.
    /// Returns the exit code.
    pub async fn shutdown(mut self) -> i32 {
        let mut retry_terminate = false;
        if self.exit_code().is_none() {
            if !self.terminate().await {
                warn!(identity = %self.identity, "Termination failed, killing workload process");
                self.request_kill();
                retry_terminate = true;
            }
        } else {
            debug!(identity = %self.identity, "Workload already exited, skipping termination");
        }

        let code = self.reap().await;

        // The spawned process may only be a client of the real workload
        if retry_terminate && !self.terminate().await {
            warn!(identity = %self.identity, "Workload may still be running after shutdown");
        }

        info!(identity = %self.identity, exit_code = code, "Workload shut down");
        code
    }

    /// Ask the workload to stop; false when the request could not be made
    async fn terminate(&mut self) -> bool {
        let Some(std_cmd) = self.launcher.terminate_command(&self.identity) else {
            self.request_kill();
            return true;
        };

        let mut cmd = Command::from(std_cmd);
        match cmd.status().await {
            Ok(status) if status.success() => {
                debug!(identity = %self.identity, "Termination requested");
                true
            }
            Ok(status) => {
                warn!(identity = %self.identity, status = %status, "Termination command failed");
                false
            }
            Err(e) => {
                warn!(identity = %self.identity, error = %e, "Failed to run termination command");
                false
            }
        }
    }

    async fn reap(&mut self) -> i32 {
        let Some(mut reaper) = self.reaper.take() else {
            return self.exit_code().unwrap_or(UNKNOWN_EXIT_CODE);
        };

        match tokio::time::timeout(self.config.shutdown_grace, &mut reaper).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(identity = %self.identity, error = %e, "Reaper task failed"),
            Err(_) => {
                warn!(
                    identity = %self.identity,
                    grace_secs = self.config.shutdown_grace.as_secs(),
                    "Workload still running after termination, killing process"
                );
                self.request_kill();
                if let Err(e) = reaper.await {
                    warn!(identity = %self.identity, error = %e, "Reaper task failed");
                }
            }
        }

        self.exit_code().unwrap_or(UNKNOWN_EXIT_CODE)
    }

    fn request_kill(&mut self) {
        if let Some(tx) = self.kill_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for ManagedWorkload {
    fn drop(&mut self) {
        if self.reaper.is_none() || self.exit_code().is_some() {
            return;
        }

        warn!(identity = %self.identity, "Workload dropped without shutdown, terminating");
        if let Some(mut std_cmd) = self.launcher.terminate_command(&self.identity) {
            std_cmd.stdout(Stdio::null()).stderr(Stdio::null());
            let spawned = match Handle::try_current() {
                // The runtime waits on the child so it is reaped
                Ok(handle) => Command::from(std_cmd).spawn().map(|mut child| {
                    handle.spawn(async move {
                        let _ = child.wait().await;
                    });
                }),
                Err(_) => std_cmd.spawn().map(drop),
            };
            if let Err(e) = spawned {
                warn!(
                    identity = %self.identity,
                    error = %e,
                    "Failed to run termination command"
                );
            }
        }
        self.request_kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_helpers() {
        assert!(!WorkloadState::Running.is_exited());
        assert_eq!(WorkloadState::Ready.exit_code(), None);
        assert!(WorkloadState::Exited(0).is_exited());
        assert_eq!(WorkloadState::Exited(137).exit_code(), Some(137));
    }

    #[test]
    fn test_default_upstream_is_unreachable() {
        let config = WorkloadConfig::default();
        assert_eq!(config.resolved_upstream(), "localhost:9999");

        let config = WorkloadConfig::default().with_upstream("");
        assert_eq!(config.resolved_upstream(), "localhost:9999");
    }

    #[test]
    fn test_explicit_upstream() {
        let config = WorkloadConfig::default().with_upstream("tester:41234");
        assert_eq!(config.resolved_upstream(), "tester:41234");
    }

    #[test]
    fn test_config_from_env_uses_readiness() {
        let env = HarnessEnv {
            readiness: ReadinessPolicy::new(3, Duration::from_millis(10)),
            ..HarnessEnv::default()
        };
        let config = WorkloadConfig::from_env(&env);
        assert_eq!(config.readiness.max_attempts, 3);
        assert!(config.upstream_address.is_none());
    }

    #[tokio::test]
    async fn test_launch_failure_is_fatal() {
        let launcher = LocalLauncher::new("/nonexistent/proxy-binary", "http://127.0.0.1:1");
        let result = ManagedWorkload::start(WorkloadConfig::default(), launcher).await;
        assert!(matches!(result, Err(HarnessError::Launch { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_identity_prefix_and_url() {
        let launcher = LocalLauncher::new("sleep", "http://127.0.0.1:1").arg("30");
        let workload = ManagedWorkload::start(WorkloadConfig::default(), launcher)
            .await
            .unwrap();

        assert!(workload.identity().starts_with("local-"));
        assert_eq!(workload.url(), "http://127.0.0.1:1");
        assert_eq!(workload.state(), WorkloadState::Running);

        workload.shutdown().await;
    }
}
