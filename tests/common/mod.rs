//! Shared utilities for workspace end-to-end tests.

#![allow(dead_code)]

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
    routing::post,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// How a [`Collector`] answers trace exports.
#[derive(Debug, Clone)]
pub struct Behaviour {
    pub status: StatusCode,
    pub retry_after: Option<&'static str>,
    pub delay: Duration,
}

impl Behaviour {
    pub fn accept() -> Self {
        Self::status(StatusCode::OK)
    }

    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            retry_after: None,
            delay: Duration::ZERO,
        }
    }

    pub fn retry_after(mut self, value: &'static str) -> Self {
        self.retry_after = Some(value);
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

struct CollectorState {
    behaviour: Mutex<Behaviour>,
    received: AtomicUsize,
    bodies: Mutex<Vec<Bytes>>,
}

/// Minimal OTLP/HTTP trace collector.
pub struct Collector {
    addr: SocketAddr,
    state: Arc<CollectorState>,
    server: tokio::task::JoinHandle<()>,
}

impl Collector {
    pub async fn start(behaviour: Behaviour) -> Self {
        let state = Arc::new(CollectorState {
            behaviour: Mutex::new(behaviour),
            received: AtomicUsize::new(0),
            bodies: Mutex::new(Vec::new()),
        });

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind collector");
        let addr = listener.local_addr().expect("Failed to read local address");

        let app = Router::new()
            .route("/v1/traces", post(handle_traces))
            .with_state(Arc::clone(&state));

        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            state,
            server,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn received(&self) -> usize {
        self.state.received.load(Ordering::SeqCst)
    }

    pub async fn bodies(&self) -> Vec<Bytes> {
        self.state.bodies.lock().await.clone()
    }

    pub async fn set_behaviour(&self, behaviour: Behaviour) {
        *self.state.behaviour.lock().await = behaviour;
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn handle_traces(State(state): State<Arc<CollectorState>>, body: Bytes) -> Response {
    state.received.fetch_add(1, Ordering::SeqCst);
    state.bodies.lock().await.push(body);

    let behaviour = state.behaviour.lock().await.clone();
    if !behaviour.delay.is_zero() {
        tokio::time::sleep(behaviour.delay).await;
    }

    let mut headers = HeaderMap::new();
    if let Some(retry_after) = behaviour.retry_after {
        headers.insert(RETRY_AFTER, HeaderValue::from_static(retry_after));
    }

    (behaviour.status, headers).into_response()
}

/// Returns a local URL nothing is listening on.
pub fn unused_endpoint() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    let port = listener.local_addr().expect("Failed to read address").port();
    format!("http://127.0.0.1:{port}")
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("otlp_exporter_base=debug,otlp_exporter_http=debug")
        .with_test_writer()
        .try_init();
}
