//! Shared helpers for proxy-harness integration tests

#![allow(dead_code)]

use proxy_harness::{
    HarnessEnv, LocalLauncher, MockUpstream, MockUpstreamConfig, ReadinessPolicy, WorkloadConfig,
};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Upstream bound to loopback and advertised as 127.0.0.1
pub fn local_upstream_config() -> MockUpstreamConfig {
    MockUpstreamConfig {
        bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
        shutdown_grace: Duration::from_secs(2),
        ..MockUpstreamConfig::with_host("127.0.0.1")
    }
}

pub async fn start_local_upstream() -> MockUpstream {
    MockUpstream::start(local_upstream_config())
        .await
        .expect("Failed to start mock upstream")
}

/// Workload config with a short readiness interval and shutdown grace
pub fn fast_config() -> WorkloadConfig {
    WorkloadConfig {
        readiness: ReadinessPolicy::new(20, Duration::from_millis(50)),
        shutdown_grace: Duration::from_secs(5),
        ..WorkloadConfig::default()
    }
}

/// Workload that runs until killed
pub fn sleeping_launcher(base_url: &str) -> LocalLauncher {
    LocalLauncher::new("sleep", base_url).arg("30")
}

/// Workload that exits with `code` after `delay_secs`
pub fn exiting_launcher(base_url: &str, delay_secs: f32, code: i32) -> LocalLauncher {
    LocalLauncher::new("sh", base_url)
        .args(["-c".to_string(), format!("sleep {delay_secs}; exit {code}")])
}

/// A loopback port with nothing listening on it
pub fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind probe port");
    listener.local_addr().expect("No local address").port()
}

pub fn loopback_url(port: u16) -> String {
    format!("http://127.0.0.1:{}", port)
}

/// Minimal HTTP server that starts listening on `port` after `delay`
/// and answers every request with `status`
pub fn delayed_health_server(port: u16, delay: Duration, status: u16) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .expect("Failed to bind delayed health server");

        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {} Status\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok",
                    status
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    })
}

/// Harness environment for docker-backed scenarios
pub fn docker_env() -> HarnessEnv {
    proxy_harness::logging::init_test();
    HarnessEnv::load().expect("Failed to load harness environment")
}
