//! Error types for storage operations.

use thiserror::Error;

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// Service answered with a non-success status.
    #[error("Status: {status}, Response: {body}")]
    Status { status: u16, body: String },
    /// Account key is not valid base64.
    #[error("Invalid storage key: {0}")]
    InvalidKey(#[from] base64::DecodeError),
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
    /// Response body could not be understood.
    #[error("Malformed response: {0}")]
    Xml(String),
    /// Failure raised by a non-HTTP store.
    #[error("{0}")]
    Other(String),
}

