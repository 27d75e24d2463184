//! Error types for the OTLP/HTTP exporter.

use otlp_exporter_base::ExportError;
use thiserror::Error;

/// A specialised Result type for exporter setup.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or constructing the exporter.
///
/// Failures of individual exports are never reported through this type; they
/// reach the export callback as an [`ExportError`].
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error")]
    Config(#[source] Box<figment::Error>),

    /// Export pipeline error.
    #[error(transparent)]
    Export(#[from] ExportError),

    /// The HTTP client could not be created.
    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),

    /// A configured header name or value is not valid HTTP.
    #[error("invalid header {name:?}")]
    InvalidHeader {
        /// Name of the offending header.
        name: String,
    },
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_config_error_keeps_source() {
        let err: Error = figment::Error::from("bad value".to_string()).into();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_export_error_is_transparent() {
        let err: Error = ExportError::Shutdown.into();
        assert_eq!(err.to_string(), ExportError::Shutdown.to_string());
    }

    #[test]
    fn test_invalid_header_names_header() {
        let err = Error::InvalidHeader {
            name: "bad header".to_string(),
        };
        assert!(err.to_string().contains("bad header"));
    }
}
