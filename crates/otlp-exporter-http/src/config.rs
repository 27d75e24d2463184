//! Configuration loading and management.
//!
//! This module provides layered configuration for the exporter using figment.
//! Configuration is loaded from (in order of priority):
//! 1. Default values (compiled in)
//! 2. Config file: `otlp-exporter.toml` (optional)
//! 3. Standard OpenTelemetry environment variables (`OTEL_*`)
//! 4. Exporter-specific environment variables (`OTLP_EXPORTER_*`)
//!
//! # Supported Standard Environment Variables
//!
//! | Variable | Config Path | Description |
//! |----------|-------------|-------------|
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | `endpoint` | Base OTLP endpoint URL |
//! | `OTEL_EXPORTER_OTLP_HEADERS` | `headers` | Comma-separated key=value pairs |
//! | `OTEL_EXPORTER_OTLP_TIMEOUT` | `timeout` | Export timeout in milliseconds |
//! | `OTEL_EXPORTER_OTLP_COMPRESSION` | `compression` | Compression (gzip or none) |
//!
//! Exporter-specific variables use `__` to separate nested keys, for example
//! `OTLP_EXPORTER_RETRY__MAX_RETRIES=3`, and take precedence over everything
//! else.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use otlp_exporter_base::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_CONCURRENCY_LIMIT, DEFAULT_INITIAL_BACKOFF,
    DEFAULT_JITTER, DEFAULT_MAX_BACKOFF, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT, DelegateConfig,
    RetryPolicy,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "otlp-exporter.toml";
const DEFAULT_ENDPOINT: &str = "http://localhost:4318";
const ENV_PREFIX: &str = "OTLP_EXPORTER_";

/// Compression algorithm for OTLP export.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// No compression.
    #[default]
    None,
    /// Gzip compression.
    Gzip,
}

/// Telemetry signal an exporter is created for.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Trace spans.
    Traces,
    /// Metrics.
    Metrics,
    /// Log records.
    Logs,
}

impl Signal {
    /// Returns the OTLP/HTTP path for this signal.
    pub fn path(self) -> &'static str {
        match self {
            Signal::Traces => "/v1/traces",
            Signal::Metrics => "/v1/metrics",
            Signal::Logs => "/v1/logs",
        }
    }
}

/// OTLP/HTTP exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    /// Base endpoint URL; the signal path is appended to it.
    pub endpoint: String,
    /// Export timeout in milliseconds, retries included.
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
    /// Maximum number of exports in flight.
    pub concurrency_limit: usize,
    /// Compression algorithm.
    pub compression: Compression,
    /// Additional headers to send with requests.
    pub headers: HashMap<String, String>,
    /// Retry behaviour.
    pub retry: RetryConfig,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            compression: Compression::None,
            headers: HashMap::new(),
            retry: RetryConfig::default(),
        }
    }
}

impl ExporterConfig {
    /// Loads configuration from all sources.
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Default values
    /// 2. Config file at `otlp-exporter.toml` (if it exists)
    /// 3. Standard `OTEL_EXPORTER_OTLP_*` environment variables
    /// 4. Environment variables with `OTLP_EXPORTER_` prefix
    ///
    /// # Errors
    ///
    /// Returns an error if configuration parsing or validation fails.
    pub fn load() -> crate::Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Loads configuration from a custom config file path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration parsing or validation fails.
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> crate::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(ExporterConfig::default()));

        if config_path.as_ref().exists() {
            figment = figment.merge(Toml::file(config_path));
        }

        figment = figment.merge(standard_otel_env());
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the loaded values can drive an exporter.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Export`] wrapping
    /// [`otlp_exporter_base::ExportError::InvalidConfiguration`] for a zero
    /// timeout or concurrency limit, a multiplier below one, or jitter
    /// outside `[0, 1]`.
    pub fn validate(&self) -> crate::Result<()> {
        self.delegate_config().validate()?;
        RetryPolicy::from(&self.retry).validate()?;
        Ok(())
    }

    /// Creates a new config builder.
    pub fn builder() -> ExporterConfigBuilder {
        ExporterConfigBuilder::new()
    }

    /// Returns the full URL for `signal`.
    pub fn signal_endpoint(&self, signal: Signal) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), signal.path())
    }

    /// Returns the delegate settings described by this configuration.
    pub fn delegate_config(&self) -> DelegateConfig {
        DelegateConfig {
            timeout: self.timeout,
            concurrency_limit: self.concurrency_limit,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds.
    #[serde(with = "duration_ms")]
    pub initial_backoff: Duration,
    /// Upper bound for any computed delay in milliseconds.
    #[serde(with = "duration_ms")]
    pub max_backoff: Duration,
    /// Growth factor applied to the delay after each retry.
    pub multiplier: f64,
    /// Maximum relative jitter applied to each delay.
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            jitter: DEFAULT_JITTER,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        RetryPolicy {
            max_retries: config.max_retries,
            initial_backoff: config.initial_backoff,
            max_backoff: config.max_backoff,
            multiplier: config.multiplier,
            jitter: config.jitter,
        }
    }
}

/// Builder for constructing configuration programmatically.
#[must_use = "builders do nothing unless .build() is called"]
pub struct ExporterConfigBuilder {
    config: ExporterConfig,
}

impl ExporterConfigBuilder {
    /// Creates a new config builder with default values.
    pub fn new() -> Self {
        Self {
            config: ExporterConfig::default(),
        }
    }

    /// Sets the base endpoint.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// Sets the export timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Sets the maximum number of exports in flight.
    pub fn concurrency_limit(mut self, limit: usize) -> Self {
        self.config.concurrency_limit = limit;
        self
    }

    /// Sets the compression algorithm.
    pub fn compression(mut self, compression: Compression) -> Self {
        self.config.compression = compression;
        self
    }

    /// Adds a header sent with every request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the number of retries after the first attempt.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.retry.max_retries = max_retries;
        self
    }

    /// Sets the delay before the first retry.
    pub fn initial_backoff(mut self, backoff: Duration) -> Self {
        self.config.retry.initial_backoff = backoff;
        self
    }

    /// Sets the upper bound for computed retry delays.
    pub fn max_backoff(mut self, backoff: Duration) -> Self {
        self.config.retry.max_backoff = backoff;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ExporterConfig {
        self.config
    }
}

impl Default for ExporterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Partial config for standard OTEL env var overrides.
#[derive(Debug, Default, Serialize)]
struct PartialConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    compression: Option<Compression>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    headers: HashMap<String, String>,
}

fn standard_otel_env() -> Serialized<PartialConfig> {
    let mut config = PartialConfig::default();

    if let Ok(endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        config.endpoint = Some(endpoint);
    }

    if let Ok(timeout) = std::env::var("OTEL_EXPORTER_OTLP_TIMEOUT") {
        config.timeout = timeout.trim().parse().ok();
        if config.timeout.is_none() {
            tracing::warn!(value = %timeout, "Ignoring invalid OTEL_EXPORTER_OTLP_TIMEOUT");
        }
    }

    if let Ok(compression) = std::env::var("OTEL_EXPORTER_OTLP_COMPRESSION") {
        config.compression = match compression.to_lowercase().as_str() {
            "gzip" => Some(Compression::Gzip),
            "none" => Some(Compression::None),
            _ => None,
        };
    }

    if let Ok(headers_str) = std::env::var("OTEL_EXPORTER_OTLP_HEADERS") {
        config.headers = parse_headers(&headers_str);
    }

    Serialized::defaults(config)
}

fn parse_headers(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
