//! Scripted collaborators for unit tests.

use crate::error::ExportError;
use crate::response::ExportResponse;
use crate::serializer::Serializer;
use crate::transport::Transport;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// What a [`ScriptedTransport`] does on one `send`.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Step {
    Success,
    SuccessWith(&'static [u8]),
    Failure,
    Retryable,
    RetryIn(i64),
    Reject,
    Hang,
}

impl Step {
    fn into_response(self) -> Result<ExportResponse, ExportError> {
        match self {
            Step::Success => Ok(ExportResponse::success()),
            Step::SuccessWith(body) => Ok(ExportResponse::success_with_data(body)),
            Step::Failure => Ok(ExportResponse::failure(ExportError::status(400, "bad request"))),
            Step::Retryable => Ok(ExportResponse::retryable(Some(ExportError::status(
                503,
                "unavailable",
            )))),
            Step::RetryIn(millis) => Ok(ExportResponse::retryable_in_millis(
                Some(ExportError::status(429, "slow down")),
                millis,
            )),
            Step::Reject => Err(ExportError::transport(std::io::Error::other(
                "transport exploded",
            ))),
            Step::Hang => unreachable!("hanging steps never produce a response"),
        }
    }
}

/// Transport that replays a script, then repeats a fallback step.
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    timeouts: Mutex<Vec<Duration>>,
    shutdowns: AtomicUsize,
    flushes: AtomicUsize,
}

impl ScriptedTransport {
    pub(crate) fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self::with_fallback(steps, Step::Success)
    }

    pub(crate) fn always(step: Step) -> Self {
        Self::with_fallback([], step)
    }

    pub(crate) fn with_fallback(steps: impl IntoIterator<Item = Step>, fallback: Step) -> Self {
        Self {
            script: Mutex::new(steps.into_iter().collect()),
            fallback,
            timeouts: Mutex::new(Vec::new()),
            shutdowns: AtomicUsize::new(0),
            flushes: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.timeouts.lock().len()
    }

    pub(crate) fn timeouts(&self) -> Vec<Duration> {
        self.timeouts.lock().clone()
    }

    pub(crate) fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    pub(crate) fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, _data: Bytes, timeout: Duration) -> Result<ExportResponse, ExportError> {
        self.timeouts.lock().push(timeout);
        let step = self.script.lock().pop_front().unwrap_or(self.fallback);
        if let Step::Hang = step {
            return std::future::pending().await;
        }
        step.into_response()
    }

    fn force_flush(&self) {
        self.flushes.fetch_add(1, Ordering::SeqCst);
    }

    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

/// Serializer for UTF-8 text batches; empty strings have nothing to send.
pub(crate) struct TextSerializer;

impl Serializer for TextSerializer {
    type Request = String;
    type Response = String;

    fn serialize_request(&self, request: &String) -> Option<Bytes> {
        (!request.is_empty()).then(|| Bytes::copy_from_slice(request.as_bytes()))
    }

    fn deserialize_response(&self, data: &[u8]) -> Result<String, ExportError> {
        String::from_utf8(data.to_vec()).map_err(ExportError::deserialize)
    }
}
