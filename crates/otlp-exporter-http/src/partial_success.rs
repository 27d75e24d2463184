//! Reporting of OTLP partial success responses.

use opentelemetry_proto::tonic::collector::{
    logs::v1::ExportLogsServiceResponse, metrics::v1::ExportMetricsServiceResponse,
    trace::v1::ExportTraceServiceResponse,
};
use otlp_exporter_base::ResponseHandler;

/// What a collector rejected from an otherwise accepted export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection<'a> {
    /// Number of rejected items.
    pub rejected: i64,
    /// Kind of item rejected, e.g. `"spans"`.
    pub item: &'static str,
    /// Collector-provided explanation, possibly empty.
    pub error_message: &'a str,
}

/// An OTLP export response that may report partial success.
pub trait PartialSuccess {
    /// Returns the rejection, or `None` if the collector accepted everything.
    fn rejection(&self) -> Option<Rejection<'_>>;
}

fn rejection<'a>(
    rejected: i64,
    item: &'static str,
    error_message: &'a str,
) -> Option<Rejection<'a>> {
    (rejected != 0 || !error_message.is_empty()).then_some(Rejection {
        rejected,
        item,
        error_message,
    })
}

impl PartialSuccess for ExportTraceServiceResponse {
    fn rejection(&self) -> Option<Rejection<'_>> {
        let partial = self.partial_success.as_ref()?;
        rejection(partial.rejected_spans, "spans", &partial.error_message)
    }
}

impl PartialSuccess for ExportMetricsServiceResponse {
    fn rejection(&self) -> Option<Rejection<'_>> {
        let partial = self.partial_success.as_ref()?;
        rejection(partial.rejected_data_points, "data points", &partial.error_message)
    }
}

impl PartialSuccess for ExportLogsServiceResponse {
    fn rejection(&self) -> Option<Rejection<'_>> {
        let partial = self.partial_success.as_ref()?;
        rejection(partial.rejected_log_records, "log records", &partial.error_message)
    }
}

/// Logs collector-reported partial successes as warnings.
#[derive(Debug, Clone, Copy, Default)]
pub struct PartialSuccessHandler;

impl<R: PartialSuccess> ResponseHandler<R> for PartialSuccessHandler {
    fn handle_response(&self, response: R) {
        if let Some(rejection) = response.rejection() {
            tracing::warn!(
                rejected = rejection.rejected,
                item = rejection.item,
                error_message = rejection.error_message,
                "Collector reported partial success"
            );
        }
    }
}
