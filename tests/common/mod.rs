//! Shared utilities for integration and load testing.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use session_gateway::config::GatewayConfig;
use session_gateway::http::HttpServer;
use session_gateway::lifecycle::Shutdown;
use session_gateway::session::{
    MemorySessionStore, SessionData, SessionStore, SessionStoreError,
};

/// One request observed by the mock upstream.
#[derive(Clone)]
pub struct CapturedRequest {
    pub method: String,
    /// Path and query exactly as received, e.g. "/foo/bar?x=1".
    pub uri: String,
    pub headers: HeaderMap,
}

/// A capturing spy server standing in for the second application.
pub struct MockUpstream {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl MockUpstream {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[derive(Clone)]
struct MockState {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    respond: Arc<dyn Fn(&CapturedRequest) -> (u16, &'static str, Vec<u8>) + Send + Sync>,
}

async fn capture_handler(State(state): State<MockState>, request: Request<Body>) -> Response {
    let captured = CapturedRequest {
        method: request.method().to_string(),
        uri: request.uri().to_string(),
        headers: request.headers().clone(),
    };
    state.requests.lock().unwrap().push(captured.clone());

    let (status, content_type, body) = (state.respond)(&captured);
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap()
}

/// Start a mock upstream whose every response comes from `respond`.
pub async fn start_mock_upstream<F>(respond: F) -> MockUpstream
where
    F: Fn(&CapturedRequest) -> (u16, &'static str, Vec<u8>) + Send + Sync + 'static,
{
    let requests = Arc::new(Mutex::new(Vec::new()));
    let state = MockState {
        requests: requests.clone(),
        respond: Arc::new(respond),
    };
    let app = Router::new().fallback(capture_handler).with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockUpstream { addr, requests }
}

/// Start a mock upstream that always returns the same response.
#[allow(dead_code)]
pub async fn start_fixed_upstream(
    status: u16,
    content_type: &'static str,
    body: &'static [u8],
) -> MockUpstream {
    start_mock_upstream(move |_| (status, content_type, body.to_vec())).await
}

/// A running gateway under test.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub config_tx: mpsc::UnboundedSender<GatewayConfig>,
}

impl TestGateway {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

/// Default test configuration pointing at `upstream_url`.
pub fn gateway_config(upstream_url: Option<String>) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.gateway.upstream_url = upstream_url;
    config.gateway.request_timeout_ms = 2_000;
    config.gateway.connect_timeout_ms = 1_000;
    config
}

/// Start a gateway on an OS-assigned port and wait until it accepts.
pub async fn start_gateway(config: GatewayConfig, store: Arc<dyn SessionStore>) -> TestGateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (config_tx, config_rx) = mpsc::unbounded_channel();
    let server = HttpServer::new(config, store);
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, config_rx, server_shutdown).await;
    });

    for _ in 0..100 {
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            return TestGateway {
                addr,
                shutdown,
                config_tx,
            };
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("gateway did not start on {addr}");
}

/// Cookie header value for the default session cookie name.
pub fn session_cookie(token: &str) -> String {
    format!("connect.sid={token}")
}

/// Non-pooling reqwest client that ignores any ambient proxy settings.
#[allow(dead_code)]
pub fn test_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Session store wrapper counting touch calls.
#[allow(dead_code)]
pub struct CountingStore {
    inner: MemorySessionStore,
    touches: AtomicU32,
}

#[allow(dead_code)]
impl CountingStore {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            inner: MemorySessionStore::new(ttl_secs),
            touches: AtomicU32::new(0),
        }
    }

    pub fn touch_count(&self) -> u32 {
        self.touches.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SessionStore for CountingStore {
    async fn create(
        &self,
        user_id: &str,
        email: Option<&str>,
    ) -> Result<String, SessionStoreError> {
        self.inner.create(user_id, email).await
    }

    async fn lookup(&self, token: &str) -> Result<Option<SessionData>, SessionStoreError> {
        self.inner.lookup(token).await
    }

    async fn touch(&self, token: &str) -> Result<(), SessionStoreError> {
        self.touches.fetch_add(1, Ordering::SeqCst);
        self.inner.touch(token).await
    }

    async fn destroy(&self, token: &str) -> Result<(), SessionStoreError> {
        self.inner.destroy(token).await
    }
}
