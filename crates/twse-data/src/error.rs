//! Error types for the data crate.

use thiserror::Error;

/// Data-layer errors.
#[derive(Debug, Error)]
pub enum DataError {
    /// Network request failed after transport-level recovery
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Instrument code cannot be used as a request key or file name
    #[error("Invalid instrument code: {0:?}")]
    InvalidInstrument(String),

    /// Filesystem error while persisting a series
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// CSV encoding error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// A single request failure surfaced by a [`RequestTransport`](crate::RequestTransport).
///
/// Certificate validation failures never appear here: the transport recovers
/// them itself with the insecure fallback attempt (when enabled).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The request did not complete within its timeout
    #[error("request timeout: {0}")]
    Timeout(String),

    /// Connection could not be established (refused, DNS, TLS)
    #[error("connection failed: {0}")]
    Connect(String),

    /// Any other request-level failure
    #[error("request failed: {0}")]
    Request(String),

    /// The response body could not be read
    #[error("failed to read response body: {0}")]
    Body(String),

    /// The HTTP client could not be constructed
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_body() || err.is_decode() {
            TransportError::Body(err.to_string())
        } else if err.is_builder() {
            TransportError::ClientBuild(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
