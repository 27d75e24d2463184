//! Shared test utilities for otlp-exporter-http integration tests.
//!
//! Provides an in-process OTLP/HTTP collector that records every request and
//! answers with scripted replies.

#![allow(dead_code)]

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{
        HeaderMap, HeaderValue, StatusCode, Uri,
        header::{CONTENT_ENCODING, HeaderName},
    },
    response::{IntoResponse, Response},
};
use flate2::read::GzDecoder;
use std::collections::VecDeque;
use std::io::Read;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// A request as seen by the collector, with gzip bodies already inflated.
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub path: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ReceivedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

/// A scripted collector reply.
#[derive(Debug, Clone)]
pub struct Reply {
    status: StatusCode,
    headers: Vec<(&'static str, String)>,
    body: Vec<u8>,
}

impl Reply {
    pub fn ok() -> Self {
        Self::status(200)
    }

    pub fn status(status: u16) -> Self {
        Self {
            status: StatusCode::from_u16(status).expect("valid status code"),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

#[derive(Default)]
struct CollectorState {
    requests: Mutex<Vec<ReceivedRequest>>,
    replies: Mutex<VecDeque<Reply>>,
    fallback: Mutex<Option<Reply>>,
}

/// In-process OTLP/HTTP collector.
pub struct MockCollector {
    addr: SocketAddr,
    state: Arc<CollectorState>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockCollector {
    /// Starts a collector answering every request with `200 OK`.
    pub async fn start() -> Self {
        Self::with_replies(Vec::new()).await
    }

    /// Starts a collector that answers with `replies` in order, then `200 OK`.
    pub async fn with_replies(replies: Vec<Reply>) -> Self {
        let state = Arc::new(CollectorState::default());
        state.replies.lock().unwrap().extend(replies);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock collector");
        let addr = listener.local_addr().expect("Failed to read local address");

        let app = Router::new()
            .fallback(handle_export)
            .with_state(Arc::clone(&state));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        Self {
            addr,
            state,
            shutdown: Some(shutdown_tx),
        }
    }

    /// Answers every request not covered by scripted replies with `reply`.
    pub fn set_fallback(&self, reply: Reply) {
        *self.state.fallback.lock().unwrap() = Some(reply);
    }

    /// Base URL of the collector, without a signal path.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Returns every request received so far.
    pub fn requests(&self) -> Vec<ReceivedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }
}

impl Drop for MockCollector {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

async fn handle_export(
    State(state): State<Arc<CollectorState>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = if headers.get(CONTENT_ENCODING).map(HeaderValue::as_bytes) == Some(b"gzip") {
        let mut inflated = Vec::new();
        if GzDecoder::new(&body[..]).read_to_end(&mut inflated).is_err() {
            return StatusCode::BAD_REQUEST.into_response();
        }
        inflated
    } else {
        body.to_vec()
    };

    state.requests.lock().unwrap().push(ReceivedRequest {
        path: uri.path().to_string(),
        headers,
        body,
    });

    let reply = state
        .replies
        .lock()
        .unwrap()
        .pop_front()
        .or_else(|| state.fallback.lock().unwrap().clone())
        .unwrap_or_else(Reply::ok);

    let mut response_headers = HeaderMap::new();
    for (name, value) in reply.headers {
        if let Ok(value) = HeaderValue::from_str(&value) {
            response_headers.insert(HeaderName::from_static(name), value);
        }
    }

    (reply.status, response_headers, reply.body).into_response()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("otlp_exporter_base=debug,otlp_exporter_http=debug")
        .with_test_writer()
        .try_init();
}
