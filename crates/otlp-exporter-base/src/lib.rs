//! Signal-agnostic export pipeline for OTLP exporters.
//!
//! This crate delivers already batched telemetry to a collector. It owns the
//! parts of an exporter that do not depend on the signal type or the network
//! stack:
//!
//! - [`ExportDelegate`] - admission control, serialization, dispatch and
//!   classification of one export, reported to a callback exactly once
//! - [`BoundedQueue`] - limits the number of exports in flight and backs
//!   `force_flush`
//! - [`RetryingTransport`] - exponential backoff with jitter under a per-export
//!   deadline; `force_flush` cancels pending retry waits
//! - [`FailoverTransport`] - falls back to a second transport on hard failures
//!
//! Leaf transports, serializers and response handlers plug in through the
//! [`Transport`], [`Serializer`] and [`ResponseHandler`] traits.
//!
//! # Example
//!
//! ```no_run
//! use otlp_exporter_base::{DelegateConfig, ExportDelegate, RetryingTransport, Transport};
//! # use otlp_exporter_base::{ExportError, ExportResponse, Serializer};
//! # use bytes::Bytes;
//! # use std::time::Duration;
//! # struct Leaf;
//! # #[async_trait::async_trait]
//! # impl Transport for Leaf {
//! #     async fn send(&self, _: Bytes, _: Duration) -> Result<ExportResponse, ExportError> {
//! #         Ok(ExportResponse::success())
//! #     }
//! #     fn shutdown(&self) {}
//! # }
//! # struct Text;
//! # impl Serializer for Text {
//! #     type Request = String;
//! #     type Response = ();
//! #     fn serialize_request(&self, r: &String) -> Option<Bytes> { Some(Bytes::from(r.clone())) }
//! #     fn deserialize_response(&self, _: &[u8]) -> Result<(), ExportError> { Ok(()) }
//! # }
//!
//! # async fn run() -> Result<(), ExportError> {
//! let delegate = ExportDelegate::new(
//!     RetryingTransport::new(Leaf),
//!     Text,
//!     DelegateConfig::default(),
//! );
//!
//! delegate.export("batch".to_string(), |result| {
//!     if let Some(error) = result.error {
//!         eprintln!("export failed: {error}");
//!     }
//! });
//!
//! delegate.shutdown().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod delegate;
pub mod error;
pub mod queue;
pub mod response;
pub mod response_handler;
pub mod serializer;
pub mod transport;

#[cfg(test)]
mod testing;

pub use delegate::{
    DEFAULT_CONCURRENCY_LIMIT, DEFAULT_TIMEOUT, DelegateConfig, ExportDelegate,
    ExportDelegateBuilder,
};
pub use error::ExportError;
pub use queue::{BoundedQueue, QueueSlot};
pub use response::{ExportResponse, ExportResult};
pub use response_handler::{NoopResponseHandler, ResponseHandler};
pub use serializer::Serializer;
pub use transport::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_BACKOFF, DEFAULT_JITTER, DEFAULT_MAX_BACKOFF,
    DEFAULT_MAX_RETRIES, FailoverTransport, FixedJitter, JitterSource, RandomJitter, RetryPolicy,
    RetryingTransport, Transport,
};
