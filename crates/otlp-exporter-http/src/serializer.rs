//! Protobuf serialization of OTLP export requests.

use bytes::Bytes;
use opentelemetry_proto::tonic::collector::{
    logs::v1::{ExportLogsServiceRequest, ExportLogsServiceResponse},
    metrics::v1::{ExportMetricsServiceRequest, ExportMetricsServiceResponse},
    trace::v1::{ExportTraceServiceRequest, ExportTraceServiceResponse},
};
use otlp_exporter_base::{ExportError, Serializer};
use prost::Message;
use std::marker::PhantomData;

/// An OTLP export request that can be encoded as protobuf.
pub trait OtlpRequest: Message + Send + Sync + 'static {
    /// Returns `true` if the request carries no resource entries.
    fn is_empty(&self) -> bool;
}

impl OtlpRequest for ExportTraceServiceRequest {
    fn is_empty(&self) -> bool {
        self.resource_spans.is_empty()
    }
}

impl OtlpRequest for ExportMetricsServiceRequest {
    fn is_empty(&self) -> bool {
        self.resource_metrics.is_empty()
    }
}

impl OtlpRequest for ExportLogsServiceRequest {
    fn is_empty(&self) -> bool {
        self.resource_logs.is_empty()
    }
}

/// Encodes `Req` and decodes `Resp` using the protobuf wire format.
pub struct ProtobufSerializer<Req, Resp> {
    _marker: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp> ProtobufSerializer<Req, Resp> {
    /// Creates a new serializer.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<Req, Resp> Default for ProtobufSerializer<Req, Resp> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Req, Resp> Serializer for ProtobufSerializer<Req, Resp>
where
    Req: OtlpRequest,
    Resp: Message + Default + Send + 'static,
{
    type Request = Req;
    type Response = Resp;

    fn serialize_request(&self, request: &Req) -> Option<Bytes> {
        if request.is_empty() {
            return None;
        }
        Some(Bytes::from(request.encode_to_vec()))
    }

    fn deserialize_response(&self, data: &[u8]) -> Result<Resp, ExportError> {
        Resp::decode(data).map_err(ExportError::deserialize)
    }
}

/// Serializer for trace exports.
pub type TraceSerializer =
    ProtobufSerializer<ExportTraceServiceRequest, ExportTraceServiceResponse>;
/// Serializer for metric exports.
pub type MetricsSerializer =
    ProtobufSerializer<ExportMetricsServiceRequest, ExportMetricsServiceResponse>;
/// Serializer for log exports.
pub type LogsSerializer = ProtobufSerializer<ExportLogsServiceRequest, ExportLogsServiceResponse>;
