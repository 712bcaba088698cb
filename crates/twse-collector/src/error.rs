//! Collector error types.

use thiserror::Error;
use twse_data::DataError;

/// Collector error
#[derive(Debug, Error)]
pub enum CollectorError {
    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure from the data layer
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// Local I/O failure (terminal output)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CollectorError>;
