//! Error types for identifier resolution and document retrieval.

use std::time::Duration;

use thiserror::Error;

/// Result type for service client and strategy operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Errors raised by the service clients and the fallback converter.
///
/// The orchestrator never lets these escape a batch call; they are recorded
/// per key as [`StrategyFailure`](crate::retrieval::StrategyFailure) reasons.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Non-success HTTP status or transport failure.
    #[error("Connection error: {0}")]
    Connection(String),
    /// A backend returned no usable identifier.
    #[error("Resolution error: {0}")]
    Resolution(String),
    /// A service answered successfully but with an empty result set.
    #[error("Not found: {0}")]
    NotFound(String),
    /// Raw document conversion failed.
    #[error("Conversion error: {0}")]
    Conversion(String),
    /// A response body could not be decoded.
    #[error("Malformed response: {0}")]
    Malformed(String),
    /// The per-identifier time budget ran out.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    /// The batch was cancelled before this identifier finished.
    #[error("Cancelled")]
    Cancelled,
}

impl FetchError {
    /// Build a connection error for a non-success response.
    pub fn status(url: &str, status: u16) -> Self {
        FetchError::Connection(format!("could not download {} (HTTP {})", url, status))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Connection(e.to_string())
    }
}

impl From<std::io::Error> for FetchError {
    fn from(e: std::io::Error) -> Self {
        FetchError::Conversion(e.to_string())
    }
}
