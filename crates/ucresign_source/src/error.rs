//! Error types for source document acquisition.

use std::time::Duration;

use thiserror::Error;
use ucresign_manifest::EnvelopeError;

/// Error type for source provider operations.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// HTTP error status.
    #[error("HTTP error: {0}")]
    Http(reqwest::StatusCode),

    /// Network request failed.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A metadata header could not be interpreted.
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    /// The document is not wrapped as expected.
    #[error("Envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("Invalid source URL: {0}")]
    InvalidUrl(String),

    /// The provider was shut down.
    #[error("Source is closed")]
    Closed,
}

impl SourceError {
    pub(crate) fn join(err: tokio::task::JoinError) -> Self {
        Self::Io(std::io::Error::other(err))
    }
}
