//! OTLP/HTTP leaf transport.
//!
//! POSTs serialized payloads with `reqwest` and classifies the collector's
//! answer: 2xx is a success, 429/502/503/504 are retryable (honouring
//! `Retry-After`), everything else is a hard failure.

use crate::config::{Compression, ExporterConfig, Signal};
use crate::error::Error;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use otlp_exporter_base::{ExportError, ExportResponse, Transport};
use reqwest::header::{
    CONTENT_ENCODING, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, RETRY_AFTER,
};
use reqwest::{Client, Response, StatusCode};
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const PROTOBUF_CONTENT_TYPE: &str = "application/x-protobuf";

/// Settings for one [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Full URL payloads are posted to.
    pub url: String,
    /// Additional headers to send with requests.
    pub headers: HashMap<String, String>,
    /// Compression applied to request bodies.
    pub compression: Compression,
}

impl HttpTransportConfig {
    /// Creates settings posting uncompressed payloads to `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            compression: Compression::None,
        }
    }

    /// Derives the transport settings for `signal` from an exporter configuration.
    pub fn for_signal(config: &ExporterConfig, signal: Signal) -> Self {
        Self {
            url: config.signal_endpoint(signal),
            headers: config.headers.clone(),
            compression: config.compression,
        }
    }
}

/// Sends OTLP protobuf payloads over HTTP.
pub struct HttpTransport {
    client: Client,
    url: String,
    headers: HeaderMap,
    compression: Compression,
    shut_down: AtomicBool,
}

impl HttpTransport {
    /// Creates a new HTTP transport.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured header is not valid HTTP or the HTTP
    /// client cannot be created.
    pub fn new(config: HttpTransportConfig) -> crate::Result<Self> {
        let mut headers = HeaderMap::with_capacity(config.headers.len());
        for (name, value) in &config.headers {
            let invalid = || Error::InvalidHeader { name: name.clone() };
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
            headers.insert(header_name, header_value);
        }

        let client = Client::builder().build().map_err(Error::Client)?;

        Ok(Self {
            client,
            url: config.url,
            headers,
            compression: config.compression,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Returns the URL payloads are posted to.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn encode_body(&self, data: Bytes) -> Result<Bytes, ExportError> {
        match self.compression {
            Compression::Gzip => gzip(&data).map(Bytes::from),
            Compression::None => Ok(data),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, data: Bytes, timeout: Duration) -> Result<ExportResponse, ExportError> {
        if self.shut_down.load(Ordering::Acquire) {
            return Ok(ExportResponse::failure(ExportError::Shutdown));
        }

        let body = match self.encode_body(data) {
            Ok(body) => body,
            Err(e) => return Ok(ExportResponse::failure(e)),
        };

        let mut request = self
            .client
            .post(&self.url)
            .timeout(timeout)
            .headers(self.headers.clone())
            .header(CONTENT_TYPE, PROTOBUF_CONTENT_TYPE)
            .body(body);

        if self.compression == Compression::Gzip {
            request = request.header(CONTENT_ENCODING, "gzip");
        }

        match request.send().await {
            Ok(response) => Ok(classify_response(response).await),
            Err(e) => Ok(classify_error(e)),
        }
    }

    fn shutdown(&self) {
        if !self.shut_down.swap(true, Ordering::AcqRel) {
            tracing::debug!(url = %self.url, "HTTP transport shut down");
        }
    }
}

/// Determines if a status code is retryable.
///
/// Retryable: 429 (Too Many Requests), 502, 503 and 504.
/// Everything else outside 2xx is a permanent failure.
fn is_retryable(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 502 | 503 | 504)
}

async fn classify_response(response: Response) -> ExportResponse {
    let status = response.status();

    if status.is_success() {
        return match response.bytes().await {
            Ok(body) if body.is_empty() => ExportResponse::success(),
            Ok(body) => ExportResponse::success_with_data(body),
            Err(e) => {
                tracing::debug!(error = %e, "Failed to read response body");
                ExportResponse::success()
            }
        };
    }

    if is_retryable(status) {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| parse_retry_after(value, Utc::now()));
        let body = response.text().await.unwrap_or_default();
        let error = ExportError::status(status.as_u16(), body);

        tracing::debug!(
            status = status.as_u16(),
            retry_after_ms = ?retry_after,
            "Received retryable status"
        );
        return match retry_after {
            Some(millis) => ExportResponse::retryable_in_millis(Some(error), millis),
            None => ExportResponse::retryable(Some(error)),
        };
    }

    let body = response.text().await.unwrap_or_default();
    tracing::error!(
        status = status.as_u16(),
        "Received non-retryable status code, not retrying"
    );
    ExportResponse::failure(ExportError::status(status.as_u16(), body))
}

fn classify_error(error: reqwest::Error) -> ExportResponse {
    if error.is_timeout() {
        tracing::debug!(error = %error, "HTTP request timed out");
        ExportResponse::retryable(Some(ExportError::Timeout))
    } else if error.is_connect() {
        tracing::debug!(error = %error, "Failed to connect to collector");
        ExportResponse::retryable(Some(ExportError::transport(error)))
    } else {
        tracing::warn!(error = %error, "HTTP request failed");
        ExportResponse::failure(ExportError::transport(error))
    }
}

/// Parses a `Retry-After` value into milliseconds.
///
/// Accepts delta-seconds or an HTTP-date. A date that has already passed
/// yields `-1`, which callers treat as "retry now".
fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<i64> {
    let value = value.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(i64::try_from(seconds.saturating_mul(1000)).unwrap_or(i64::MAX));
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let millis = (date.with_timezone(&Utc) - now).num_milliseconds();
    Some(if millis < 0 { -1 } else { millis })
}

fn gzip(data: &[u8]) -> Result<Vec<u8>, ExportError> {
    use flate2::Compression as GzCompression;
    use flate2::write::GzEncoder;

    let mut encoder = GzEncoder::new(Vec::new(), GzCompression::default());
    encoder.write_all(data).map_err(ExportError::encode)?;
    encoder.finish().map_err(ExportError::encode)
}
