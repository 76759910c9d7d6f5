// src/upstream.rs
// Mock upstream server that records the last request it received

use crate::config::HarnessEnv;
use crate::error::{HarnessError, Result};
use axum::Router;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, StatusCode};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Body returned for every request
pub const DEFAULT_BODY: &str = "I am AP server";

/// Correlation header the proxy is expected to attach
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Snapshot of a request as seen by the upstream
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: Method,
    /// Path including the query string, if any
    pub path: String,
    pub headers: HeaderMap,
}

impl CapturedRequest {
    fn from_request(req: &Request) -> Self {
        let path = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| req.uri().path().to_string());

        Self {
            method: req.method().clone(),
            path,
            headers: req.headers().clone(),
        }
    }

    /// Header value as a string, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Non-empty correlation header value
    pub fn request_id(&self) -> Option<&str> {
        self.header(REQUEST_ID_HEADER).filter(|v| !v.trim().is_empty())
    }
}

/// Options for starting a mock upstream
#[derive(Debug, Clone)]
pub struct MockUpstreamConfig {
    /// Host the workload uses to reach this server (required)
    pub host: Option<String>,
    /// Local interface to bind; port is always picked by the OS
    pub bind_ip: IpAddr,
    /// Response body
    pub body: String,
    /// How long `close` waits for in-flight connections before aborting
    pub shutdown_grace: Duration,
}

impl Default for MockUpstreamConfig {
    fn default() -> Self {
        Self {
            host: None,
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            body: DEFAULT_BODY.to_string(),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl MockUpstreamConfig {
    /// Config advertising `host`
    pub fn with_host(host: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            ..Self::default()
        }
    }
}

#[derive(Clone)]
struct UpstreamState {
    last_request: Arc<Mutex<Option<CapturedRequest>>>,
    request_count: Arc<AtomicUsize>,
    body: Arc<str>,
}

impl UpstreamState {
    fn new(body: &str) -> Self {
        Self {
            last_request: Arc::new(Mutex::new(None)),
            request_count: Arc::new(AtomicUsize::new(0)),
            body: Arc::from(body),
        }
    }

    fn record(&self, captured: CapturedRequest) {
        let mut last = self
            .last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *last = Some(captured);
        self.request_count.fetch_add(1, Ordering::SeqCst);
    }

    fn snapshot(&self) -> Option<CapturedRequest> {
        self.last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

async fn capture(State(state): State<UpstreamState>, req: Request) -> (StatusCode, String) {
    let captured = CapturedRequest::from_request(&req);
    debug!(method = %captured.method, path = %captured.path, "Upstream received request");
    state.record(captured);
    (StatusCode::OK, state.body.to_string())
}

fn router(state: UpstreamState) -> Router {
    Router::new().fallback(capture).with_state(state)
}

/// Running mock upstream
pub struct MockUpstream {
    host: String,
    local_addr: SocketAddr,
    state: UpstreamState,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
    shutdown_grace: Duration,
}

impl MockUpstream {
    /// Bind a free port and start serving in the background.
    ///
    /// The listener is bound before this returns, so connections are accepted
    /// as soon as the caller has the handle.
    pub async fn start(config: MockUpstreamConfig) -> Result<Self> {
        let host = config
            .host
            .filter(|h| !h.trim().is_empty())
            .ok_or(HarnessError::MissingEnv(crate::config::ENV_TESTER_NAME))?;

        let bind_addr = SocketAddr::new(config.bind_ip, 0);
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|source| HarnessError::Bind {
                addr: bind_addr.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let state = UpstreamState::new(&config.body);
        let app = router(state.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            // A dropped sender also counts as a shutdown request
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                warn!(error = %e, "Mock upstream serve loop failed");
            }
        });

        info!(host = %host, addr = %local_addr, "Mock upstream listening");

        Ok(Self {
            host,
            local_addr,
            state,
            shutdown_tx,
            task,
            shutdown_grace: config.shutdown_grace,
        })
    }

    /// Start with the host taken from TESTER_NAME
    pub async fn start_from_env(env: &HarnessEnv) -> Result<Self> {
        Self::start(MockUpstreamConfig::with_host(env.upstream_host()?)).await
    }

    /// `host:port` to hand to the workload as its upstream
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.local_addr.port())
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Address the listener is bound to locally
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Most recent request, or None before the first one arrives
    pub fn last_request(&self) -> Option<CapturedRequest> {
        self.state.snapshot()
    }

    /// Number of requests handled so far
    pub fn request_count(&self) -> usize {
        self.state.request_count.load(Ordering::SeqCst)
    }

    /// Stop the server and wait for the serve task to finish.
    ///
    /// Errors are logged rather than returned; once the test is tearing down
    /// there is nothing useful it could do with them.
    pub async fn close(self) {
        let Self {
            local_addr,
            shutdown_tx,
            mut task,
            shutdown_grace,
            ..
        } = self;

        let _ = shutdown_tx.send(());

        match tokio::time::timeout(shutdown_grace, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Mock upstream task failed"),
            Err(_) => {
                warn!(
                    addr = %local_addr,
                    grace_ms = shutdown_grace.as_millis() as u64,
                    "Mock upstream did not drain in time, aborting"
                );
                task.abort();
                if let Err(e) = task.await
                    && !e.is_cancelled()
                {
                    warn!(error = %e, "Mock upstream task failed");
                }
            }
        }

        info!(addr = %local_addr, "Mock upstream closed");
    }
}
