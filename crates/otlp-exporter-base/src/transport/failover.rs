//! Failover decorator.

use super::Transport;
use crate::error::ExportError;
use crate::response::ExportResponse;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

/// Sends through `primary` and falls back to `failover` on a hard failure.
///
/// Retryable responses are returned as they are; retrying is the job of a
/// [`RetryingTransport`](super::RetryingTransport) layered on top.
pub struct FailoverTransport<P, F> {
    primary: P,
    failover: F,
}

impl<P: Transport, F: Transport> FailoverTransport<P, F> {
    /// Creates a failover transport from two transports.
    pub fn new(primary: P, failover: F) -> Self {
        Self { primary, failover }
    }
}

#[async_trait]
impl<P: Transport, F: Transport> Transport for FailoverTransport<P, F> {
    async fn send(&self, data: Bytes, timeout: Duration) -> Result<ExportResponse, ExportError> {
        let response = self.primary.send(data.clone(), timeout).await?;
        if let ExportResponse::Failure { error } = &response {
            tracing::warn!(error = %error, "Primary transport failed, trying failover transport");
            return self.failover.send(data, timeout).await;
        }
        Ok(response)
    }

    fn force_flush(&self) {
        self.primary.force_flush();
        self.failover.force_flush();
    }

    fn shutdown(&self) {
        self.primary.shutdown();
        self.failover.shutdown();
    }
}
