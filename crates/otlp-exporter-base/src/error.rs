//! Error types for the export pipeline.

use std::sync::Arc;
use thiserror::Error;

/// Errors produced while exporting a batch.
///
/// The same type is carried inside transport responses, handed to export
/// callbacks and returned from flush/shutdown, so every layer of the
/// transport chain speaks one error vocabulary.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ExportError {
    /// The delegate already has as many exports in flight as it allows.
    #[error("Concurrent export limit reached")]
    ConcurrencyLimitReached,

    /// The serializer produced no bytes for the batch.
    #[error("Nothing to send")]
    NothingToSend,

    /// The transport gave up on a retryable response without a more specific error.
    #[error("Export failed with retryable status")]
    RetryableStatus,

    /// A pending retry was abandoned because the transport was flushed.
    #[error("Retry cancelled due to forceFlush()")]
    RetryCancelled,

    /// The transport produced an outcome that could not be classified.
    #[error("unknown error")]
    Unknown,

    /// The exporter or transport has already been shut down.
    #[error("exporter has been shut down")]
    Shutdown,

    /// An operation was pushed onto a queue that is already at capacity.
    #[error("queue is at capacity ({limit} in-flight operations)")]
    QueueFull {
        /// Configured capacity of the queue.
        limit: usize,
    },

    /// An operation tracked by the queue failed while being awaited.
    #[error("in-flight export failed")]
    InFlight(#[source] Arc<ExportError>),

    /// The collector answered with a non-success status.
    #[error("server returned {status}: {body}")]
    Status {
        /// HTTP status code returned by the collector.
        status: u16,
        /// Response body returned by the collector.
        body: String,
    },

    /// The attempt did not complete within its time budget.
    #[error("request timed out")]
    Timeout,

    /// The underlying I/O layer failed.
    #[error("transport error")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Encoding the request failed.
    #[error("failed to encode request")]
    Encode(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Decoding the collector response failed.
    #[error("failed to decode response")]
    Deserialize(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A configuration value was rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl ExportError {
    /// Builds a [`ExportError::Status`] from a status code and body.
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Wraps an I/O level error.
    pub fn transport<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Self::Transport(Box::new(error))
    }

    /// Wraps an encoding error.
    pub fn encode<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Self::Encode(Box::new(error))
    }

    /// Wraps a response decoding error.
    pub fn deserialize<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Self::Deserialize(Box::new(error))
    }
}
