//! OTLP/HTTP protobuf exporter.
//!
//! Assembles the pieces of `otlp-exporter-base` into a ready-to-use exporter:
//! an [`HttpTransport`] wrapped in a retrying transport, driven by an
//! [`ExportDelegate`] that encodes `opentelemetry-proto` requests and reports
//! partial successes through `tracing`.
//!
//! # Example
//!
//! ```no_run
//! use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
//! use otlp_exporter_http::{
//!     ExporterConfig, Signal, TraceSerializer, create_otlp_http_export_delegate,
//! };
//!
//! # async fn run() -> otlp_exporter_http::Result<()> {
//! let config = ExporterConfig::load()?;
//! let delegate =
//!     create_otlp_http_export_delegate(&config, Signal::Traces, TraceSerializer::new())?;
//!
//! let result = delegate.export_async(ExportTraceServiceRequest::default()).await;
//! if let Some(error) = result.error {
//!     tracing::warn!(error = %error, "Trace export failed");
//! }
//!
//! delegate.shutdown().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod partial_success;
pub mod serializer;
pub mod transport;

pub use config::{Compression, ExporterConfig, ExporterConfigBuilder, RetryConfig, Signal};
pub use error::{Error, Result};
pub use partial_success::{PartialSuccess, PartialSuccessHandler, Rejection};
pub use serializer::{
    LogsSerializer, MetricsSerializer, OtlpRequest, ProtobufSerializer, TraceSerializer,
};
pub use transport::{HttpTransport, HttpTransportConfig};

use otlp_exporter_base::{ExportDelegate, RetryPolicy, RetryingTransport, Serializer};

/// Creates an export delegate posting `signal` data to the configured collector.
///
/// The transport chain is `RetryingTransport -> HttpTransport`; the signal
/// path is appended to `config.endpoint`. Partial successes reported by the
/// collector are logged as warnings.
///
/// # Errors
///
/// Returns an error if the configuration fails [`ExporterConfig::validate`],
/// a configured header is invalid, or the HTTP client cannot be created.
pub fn create_otlp_http_export_delegate<S>(
    config: &ExporterConfig,
    signal: Signal,
    serializer: S,
) -> Result<ExportDelegate<S>>
where
    S: Serializer,
    S::Response: PartialSuccess,
{
    config.validate()?;
    let transport = HttpTransport::new(HttpTransportConfig::for_signal(config, signal))?;
    tracing::debug!(
        url = transport.url(),
        timeout_ms = config.timeout.as_millis() as u64,
        concurrency_limit = config.concurrency_limit,
        "Creating OTLP/HTTP export delegate"
    );

    let transport = RetryingTransport::with_policy(transport, RetryPolicy::from(&config.retry));

    Ok(ExportDelegate::builder(transport, serializer)
        .config(config.delegate_config())
        .response_handler(PartialSuccessHandler)
        .build())
}
