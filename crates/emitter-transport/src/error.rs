//! Transport error types.

use thiserror::Error;

/// Errors raised while building a transport. Send failures are not errors:
/// they are reported through [`crate::RequestOutcome`].
#[derive(Error, Debug)]
pub enum TransportError {
    /// Collector URL or other setting rejected
    #[error("Configuration error: {0}")]
    Config(#[from] emitter_config::ConfigError),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Custom header name or value is not valid HTTP
    #[error("Invalid header {0}")]
    InvalidHeader(String),
}

/// Result type alias using TransportError.
pub type TransportResult<T> = Result<T, TransportError>;
