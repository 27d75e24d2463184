//! Transport responses and export results.

use crate::error::ExportError;
use bytes::Bytes;
use std::time::Duration;

/// Classified outcome of a single [`Transport::send`](crate::Transport::send).
#[derive(Debug)]
pub enum ExportResponse {
    /// The collector accepted the payload.
    Success {
        /// Raw response body, if the collector sent one.
        data: Option<Bytes>,
    },
    /// The payload was rejected and must not be resent.
    Failure {
        /// Why the payload was rejected.
        error: ExportError,
    },
    /// The payload was not delivered but may be accepted if resent.
    Retryable {
        /// What went wrong, if known.
        error: Option<ExportError>,
        /// Delay requested by the collector before the next attempt.
        retry_in: Option<Duration>,
    },
}

impl ExportResponse {
    /// A success without a response body.
    pub fn success() -> Self {
        Self::Success { data: None }
    }

    /// A success carrying the collector's response body.
    pub fn success_with_data(data: impl Into<Bytes>) -> Self {
        Self::Success {
            data: Some(data.into()),
        }
    }

    /// A terminal failure.
    pub fn failure(error: ExportError) -> Self {
        Self::Failure { error }
    }

    /// A retryable outcome with no collector-provided delay.
    pub fn retryable(error: Option<ExportError>) -> Self {
        Self::Retryable {
            error,
            retry_in: None,
        }
    }

    /// A retryable outcome with a collector-provided delay in milliseconds.
    ///
    /// Negative values (a `Retry-After` date already in the past is reported
    /// as `-1`) mean "retry immediately" and become a zero delay.
    pub fn retryable_in_millis(error: Option<ExportError>, retry_in_millis: i64) -> Self {
        let millis = u64::try_from(retry_in_millis).unwrap_or(0);
        Self::Retryable {
            error,
            retry_in: Some(Duration::from_millis(millis)),
        }
    }

    /// Returns `true` for [`ExportResponse::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns `true` for [`ExportResponse::Failure`].
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    /// Returns `true` for [`ExportResponse::Retryable`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }

    /// Collector-provided retry delay, only present on retryable responses.
    pub fn retry_in(&self) -> Option<Duration> {
        match self {
            Self::Retryable { retry_in, .. } => *retry_in,
            _ => None,
        }
    }

    /// The error carried by a failure or retryable response.
    pub fn error(&self) -> Option<&ExportError> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error } => Some(error),
            Self::Retryable { error, .. } => error.as_ref(),
        }
    }
}

/// Outcome of one [`ExportDelegate::export`](crate::ExportDelegate::export) call.
#[derive(Debug)]
pub struct ExportResult {
    /// Whether the batch was delivered.
    pub success: bool,
    /// Why delivery failed; `None` on success.
    pub error: Option<ExportError>,
}

impl ExportResult {
    /// A successful export.
    pub fn success() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// A failed export.
    pub fn failure(error: ExportError) -> Self {
        Self {
            success: false,
            error: Some(error),
        }
    }

    /// Returns `true` if the batch was delivered.
    pub fn is_success(&self) -> bool {
        self.success
    }
}
