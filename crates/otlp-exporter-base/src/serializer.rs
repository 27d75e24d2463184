//! Conversion between internal batches and wire bytes.

use crate::error::ExportError;
use bytes::Bytes;

/// Converts batches into request bytes and collector replies into responses.
pub trait Serializer: Send + Sync + 'static {
    /// Batch type accepted by the exporter.
    type Request: Send + 'static;
    /// Decoded collector response.
    type Response: Send + 'static;

    /// Encodes a batch, or returns `None` when there is nothing worth sending.
    fn serialize_request(&self, request: &Self::Request) -> Option<Bytes>;

    /// Decodes the body the collector returned for a successful export.
    fn deserialize_response(&self, data: &[u8]) -> Result<Self::Response, ExportError>;
}
