// src/main.rs
// proxy-harness - run the harness pieces by hand for debugging proxy images

use anyhow::Result;
use clap::{Parser, Subcommand};
use proxy_harness::upstream::DEFAULT_BODY;
use proxy_harness::{
    DockerLauncher, HarnessEnv, ManagedWorkload, MockUpstream, MockUpstreamConfig, WorkloadConfig,
};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "proxy-harness")]
#[command(about = "Lifecycle control for black-box tests against a reverse proxy")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a mock upstream until Ctrl-C
    Upstream {
        /// Host advertised to the proxy
        #[arg(long, env = "TESTER_NAME")]
        host: String,

        /// Response body
        #[arg(long, default_value = DEFAULT_BODY)]
        body: String,
    },

    /// Launch the proxy container, wait for it to become ready, hold until Ctrl-C
    Workload {
        /// Upstream address (default: an address nobody listens on)
        #[arg(short, long)]
        upstream: Option<String>,

        /// Image override
        #[arg(long)]
        image: Option<String>,

        /// Readiness attempts override
        #[arg(long)]
        attempts: Option<u32>,
    },

    /// Print a random resource name suffix
    Suffix,
}

#[tokio::main]
async fn main() -> Result<()> {
    proxy_harness::logging::init()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Upstream { host, body } => run_upstream(host, body).await,
        Commands::Workload {
            upstream,
            image,
            attempts,
        } => run_workload(upstream, image, attempts).await,
        Commands::Suffix => {
            println!("{}", proxy_harness::identity::random_suffix());
            Ok(())
        }
    }
}

async fn run_upstream(host: String, body: String) -> Result<()> {
    let upstream = MockUpstream::start(MockUpstreamConfig {
        body,
        ..MockUpstreamConfig::with_host(host)
    })
    .await?;
    println!("{}", upstream.address());

    tokio::signal::ctrl_c().await?;

    info!(requests = upstream.request_count(), "Stopping mock upstream");
    if let Some(last) = upstream.last_request() {
        info!(
            method = %last.method,
            path = %last.path,
            request_id = last.request_id().unwrap_or("-"),
            "Last request"
        );
    }
    upstream.close().await;
    Ok(())
}

async fn run_workload(
    upstream: Option<String>,
    image: Option<String>,
    attempts: Option<u32>,
) -> Result<()> {
    let env = HarnessEnv::load()?;
    let mut launcher = DockerLauncher::from_env(&env)?;
    if let Some(image) = image {
        launcher = launcher.with_image(image);
    }

    let mut config = WorkloadConfig::from_env(&env);
    config.upstream_address = upstream;
    let max_attempts = attempts.unwrap_or(config.readiness.max_attempts);

    let workload = ManagedWorkload::start(config, launcher).await?;
    if let Err(e) = workload.await_ready(max_attempts).await {
        let code = workload.shutdown().await;
        warn!(exit_code = code, "Workload shut down after failed startup");
        return Err(e.into());
    }
    println!("{}", workload.url());

    tokio::select! {
        res = tokio::signal::ctrl_c() => res?,
        code = workload.wait_exit() => warn!(exit_code = code, "Workload exited on its own"),
    }

    workload.shutdown().await;
    Ok(())
}
