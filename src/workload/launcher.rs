// src/workload/launcher.rs
// How a workload process is started, terminated and addressed

use crate::config::HarnessEnv;
use crate::error::Result;
use std::process::{Command, Stdio};

/// Environment variable carrying the upstream address into the workload
pub const UPSTREAM_ADDR_VAR: &str = "AP_SERVER_ADDR";

/// Environment variable carrying the workload identity (local launches only)
pub const WORKLOAD_NAME_VAR: &str = "WORKLOAD_NAME";

/// Builds the commands that start and stop one kind of workload
pub trait Launcher: Send + Sync {
    /// Prefix for generated identities
    fn name_prefix(&self) -> &str;

    /// Command that runs the workload in the foreground until it exits
    fn command(&self, identity: &str, upstream: &str) -> Command;

    /// Command that asks the workload to stop.
    ///
    /// `None` means the spawned process is signalled directly.
    fn terminate_command(&self, identity: &str) -> Option<Command>;

    /// Base URL the workload serves HTTP on
    fn base_url(&self, identity: &str) -> String;
}

/// Runs the workload as a container attached to a shared network
#[derive(Debug, Clone)]
pub struct DockerLauncher {
    pub binary: String,
    pub network: String,
    pub image: String,
    pub port: u16,
    pub name_prefix: String,
}

impl DockerLauncher {
    pub fn new(network: impl Into<String>) -> Self {
        let defaults = HarnessEnv::default();
        Self {
            binary: defaults.docker_binary,
            network: network.into(),
            image: defaults.image,
            port: defaults.workload_port,
            name_prefix: "nginx".to_string(),
        }
    }

    /// Launcher configured from the environment; DOCKER_NETWORK is required
    pub fn from_env(env: &HarnessEnv) -> Result<Self> {
        Ok(Self {
            binary: env.docker_binary.clone(),
            network: env.network()?.to_string(),
            image: env.image.clone(),
            port: env.workload_port,
            name_prefix: "nginx".to_string(),
        })
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    /// Arguments for `docker run`
    pub fn run_args(&self, identity: &str, upstream: &str) -> Vec<String> {
        vec![
            "run".to_string(),
            "--rm".to_string(),
            "--name".to_string(),
            identity.to_string(),
            "--net".to_string(),
            self.network.clone(),
            "-e".to_string(),
            format!("{}={}", UPSTREAM_ADDR_VAR, upstream),
            self.image.clone(),
        ]
    }
}

impl Launcher for DockerLauncher {
    fn name_prefix(&self) -> &str {
        &self.name_prefix
    }

    fn command(&self, identity: &str, upstream: &str) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(self.run_args(identity, upstream))
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        cmd
    }

    fn terminate_command(&self, identity: &str) -> Option<Command> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["kill", identity])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());
        Some(cmd)
    }

    fn base_url(&self, identity: &str) -> String {
        format!("http://{}:{}", identity, self.port)
    }
}

/// Runs the workload as a plain local process with a fixed base URL
#[derive(Debug, Clone)]
pub struct LocalLauncher {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub base_url: String,
    pub name_prefix: String,
}

impl LocalLauncher {
    pub fn new(program: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            base_url: base_url.into(),
            name_prefix: "local".to_string(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

impl Launcher for LocalLauncher {
    fn name_prefix(&self) -> &str {
        &self.name_prefix
    }

    fn command(&self, identity: &str, upstream: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .env(UPSTREAM_ADDR_VAR, upstream)
            .env(WORKLOAD_NAME_VAR, identity)
            .stdin(Stdio::null());
        cmd
    }

    fn terminate_command(&self, _identity: &str) -> Option<Command> {
        None
    }

    fn base_url(&self, _identity: &str) -> String {
        self.base_url.clone()
    }
}
