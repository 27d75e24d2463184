//! Transports and transport decorators.
//!
//! A [`Transport`] sends an already serialized payload and classifies what the
//! collector said about it. Decorators wrap another transport and are stacked
//! into a chain, typically `RetryingTransport -> FailoverTransport -> leaf`.

mod failover;
mod retrying;

pub use failover::FailoverTransport;
pub use retrying::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_BACKOFF, DEFAULT_JITTER, DEFAULT_MAX_BACKOFF,
    DEFAULT_MAX_RETRIES, FixedJitter, JitterSource, RandomJitter, RetryPolicy, RetryingTransport,
};

use crate::error::ExportError;
use crate::response::ExportResponse;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

/// Sends serialized payloads to a collector.
///
/// Ordinary delivery problems (refused connections, error statuses, timeouts)
/// are reported as [`ExportResponse::Failure`] or [`ExportResponse::Retryable`].
/// `Err` is reserved for unexpected conditions; decorators pass it through
/// untouched and the export delegate reports it as a failed export.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `data`, giving up after `timeout`.
    async fn send(&self, data: Bytes, timeout: Duration) -> Result<ExportResponse, ExportError>;

    /// Abandons any waiting the transport does between attempts.
    ///
    /// Attempts already on the wire are not affected.
    fn force_flush(&self) {}

    /// Releases the transport's resources.
    fn shutdown(&self);
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn send(&self, data: Bytes, timeout: Duration) -> Result<ExportResponse, ExportError> {
        (**self).send(data, timeout).await
    }

    fn force_flush(&self) {
        (**self).force_flush();
    }

    fn shutdown(&self) {
        (**self).shutdown();
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, data: Bytes, timeout: Duration) -> Result<ExportResponse, ExportError> {
        (**self).send(data, timeout).await
    }

    fn force_flush(&self) {
        (**self).force_flush();
    }

    fn shutdown(&self) {
        (**self).shutdown();
    }
}
