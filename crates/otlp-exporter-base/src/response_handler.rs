//! Side-effect sinks for decoded collector responses.

/// Consumes a decoded collector response, e.g. to report partial success.
///
/// Handlers run on the export task and must not panic.
pub trait ResponseHandler<R>: Send + Sync {
    /// Handles one decoded response.
    fn handle_response(&self, response: R);
}

impl<R, F> ResponseHandler<R> for F
where
    F: Fn(R) + Send + Sync,
{
    fn handle_response(&self, response: R) {
        self(response)
    }
}

/// Discards every response.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopResponseHandler;

impl<R> ResponseHandler<R> for NoopResponseHandler {
    fn handle_response(&self, _response: R) {}
}
