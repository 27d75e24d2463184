//! Export delegate driving one export from batch to result.

use crate::error::ExportError;
use crate::queue::BoundedQueue;
use crate::response::{ExportResponse, ExportResult};
use crate::response_handler::{NoopResponseHandler, ResponseHandler};
use crate::serializer::Serializer;
use crate::transport::Transport;
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;

/// Default budget for one export, retries included.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);
/// Default number of exports allowed in flight at once.
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 30;

/// Construction-time settings for an [`ExportDelegate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelegateConfig {
    /// Time budget handed to the transport for each export.
    pub timeout: Duration,
    /// Maximum number of exports in flight.
    pub concurrency_limit: usize,
}

impl Default for DelegateConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
        }
    }
}

impl DelegateConfig {
    /// Checks that the settings describe a delegate able to export anything.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::InvalidConfiguration`] for a zero timeout or a
    /// zero concurrency limit.
    pub fn validate(&self) -> Result<(), ExportError> {
        if self.timeout.is_zero() {
            return Err(ExportError::InvalidConfiguration(
                "timeout must be greater than zero".to_string(),
            ));
        }

        if self.concurrency_limit == 0 {
            return Err(ExportError::InvalidConfiguration(
                "concurrency_limit must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

struct DelegateInner<S: Serializer> {
    serializer: S,
    transport: Box<dyn Transport>,
    response_handler: Box<dyn ResponseHandler<S::Response>>,
    timeout: Duration,
}

impl<S: Serializer> DelegateInner<S> {
    async fn send(&self, data: Bytes) -> ExportResult {
        match self.transport.send(data, self.timeout).await {
            Ok(ExportResponse::Success { data }) => {
                if let Some(body) = data.filter(|body| !body.is_empty()) {
                    match self.serializer.deserialize_response(&body) {
                        Ok(response) => self.response_handler.handle_response(response),
                        Err(e) => {
                            tracing::warn!(
                                error = %e,
                                "Export succeeded but the collector response could not be decoded"
                            );
                        }
                    }
                }
                ExportResult::success()
            }
            Ok(ExportResponse::Failure { error }) => {
                tracing::debug!(error = %error, "Export failed");
                ExportResult::failure(error)
            }
            Ok(ExportResponse::Retryable { error, .. }) => {
                let error = error.unwrap_or(ExportError::RetryableStatus);
                tracing::debug!(error = %error, "Export failed with retryable status");
                ExportResult::failure(error)
            }
            Err(error) => {
                tracing::warn!(error = %error, "Transport rejected export");
                ExportResult::failure(error)
            }
        }
    }
}

/// Drives exports through a serializer and a transport chain.
///
/// Each [`export`](Self::export) call reports exactly one [`ExportResult`] to
/// its callback. At most `concurrency_limit` exports are in flight; further
/// calls fail immediately with [`ExportError::ConcurrencyLimitReached`].
/// Results of concurrent exports can arrive in any order.
pub struct ExportDelegate<S: Serializer> {
    inner: Arc<DelegateInner<S>>,
    queue: BoundedQueue,
    is_shutdown: AtomicBool,
}

impl<S: Serializer> ExportDelegate<S> {
    /// Creates a delegate that owns `transport` and discards collector responses.
    pub fn new(
        transport: impl Transport + 'static,
        serializer: S,
        config: DelegateConfig,
    ) -> Self {
        Self::builder(transport, serializer).config(config).build()
    }

    /// Starts building a delegate around `transport` and `serializer`.
    pub fn builder(transport: impl Transport + 'static, serializer: S) -> ExportDelegateBuilder<S> {
        ExportDelegateBuilder {
            transport: Box::new(transport),
            serializer,
            response_handler: Box::new(NoopResponseHandler),
            config: DelegateConfig::default(),
        }
    }

    /// Time budget handed to the transport for each export.
    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Number of exports currently in flight.
    pub fn in_flight(&self) -> usize {
        self.queue.len()
    }

    /// Exports `batch` and reports the outcome to `callback`.
    ///
    /// Admission and serialization failures are reported before this returns;
    /// otherwise the send runs on a spawned task and `callback` fires when it
    /// settles.
    ///
    /// # Panics
    ///
    /// Panics if a send has to be spawned outside a tokio runtime.
    pub fn export<F>(&self, batch: S::Request, callback: F)
    where
        F: FnOnce(ExportResult) + Send + 'static,
    {
        if self.is_shutdown.load(Ordering::Acquire) {
            tracing::debug!("Export called after shutdown");
            callback(ExportResult::failure(ExportError::Shutdown));
            return;
        }

        let Some(slot) = self.queue.try_reserve() else {
            tracing::debug!(
                limit = self.queue.limit(),
                "Dropping export, concurrent export limit reached"
            );
            callback(ExportResult::failure(ExportError::ConcurrencyLimitReached));
            return;
        };

        let data = match self.inner.serializer.serialize_request(&batch) {
            Some(data) if !data.is_empty() => data,
            _ => {
                drop(slot);
                callback(ExportResult::failure(ExportError::NothingToSend));
                return;
            }
        };

        tracing::debug!(bytes = data.len(), "Dispatching export");
        let inner = Arc::clone(&self.inner);
        slot.push(async move {
            let result = inner.send(data).await;
            callback(result);
            Ok(())
        });
    }

    /// Exports `batch` and waits for the outcome.
    pub async fn export_async(&self, batch: S::Request) -> ExportResult {
        let (tx, rx) = oneshot::channel();
        self.export(batch, move |result| {
            let _ = tx.send(result);
        });
        rx.await
            .unwrap_or_else(|_| ExportResult::failure(ExportError::Unknown))
    }

    /// Cancels pending retry waits and waits for every in-flight export.
    ///
    /// # Errors
    ///
    /// Returns an error if a tracked export task failed.
    pub async fn force_flush(&self) -> Result<(), ExportError> {
        self.inner.transport.force_flush();
        self.queue.await_all().await
    }

    /// Flushes, then shuts the transport chain down.
    ///
    /// Only the first call does any work; later calls return `Ok(())`.
    /// Exports started after shutdown fail with [`ExportError::Shutdown`].
    ///
    /// # Errors
    ///
    /// Returns the flush error, if any; the transport is shut down regardless.
    pub async fn shutdown(&self) -> Result<(), ExportError> {
        if self.is_shutdown.swap(true, Ordering::AcqRel) {
            tracing::debug!("Export delegate already shut down");
            return Ok(());
        }

        tracing::debug!(in_flight = self.queue.len(), "Shutting down export delegate");
        let flushed = self.force_flush().await;
        self.inner.transport.shutdown();
        flushed
    }
}

/// Builder for an [`ExportDelegate`].
#[must_use = "builders do nothing unless .build() is called"]
pub struct ExportDelegateBuilder<S: Serializer> {
    transport: Box<dyn Transport>,
    serializer: S,
    response_handler: Box<dyn ResponseHandler<S::Response>>,
    config: DelegateConfig,
}

impl<S: Serializer> ExportDelegateBuilder<S> {
    /// Sets timeout and concurrency limit.
    pub fn config(mut self, config: DelegateConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the time budget for each export.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Sets the maximum number of exports in flight.
    pub fn concurrency_limit(mut self, limit: usize) -> Self {
        self.config.concurrency_limit = limit;
        self
    }

    /// Sets the handler that receives decoded collector responses.
    pub fn response_handler(
        mut self,
        handler: impl ResponseHandler<S::Response> + 'static,
    ) -> Self {
        self.response_handler = Box::new(handler);
        self
    }

    /// Builds the delegate.
    pub fn build(self) -> ExportDelegate<S> {
        ExportDelegate {
            inner: Arc::new(DelegateInner {
                serializer: self.serializer,
                transport: self.transport,
                response_handler: self.response_handler,
                timeout: self.config.timeout,
            }),
            queue: BoundedQueue::new(self.config.concurrency_limit),
            is_shutdown: AtomicBool::new(false),
        }
    }
}
