//! Refresh and configuration error types.

use std::path::PathBuf;

use thiserror::Error;
use ucresign_manifest::PatchError;
use ucresign_signing::{SigningError, VerifyError};
use ucresign_source::SourceError;

/// Why a refresh cycle did not publish a new generation.
///
/// Every variant except a fatal [`RefreshError::Sign`] aborts only the
/// current cycle; the previously published artifacts stay in place.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("Failed to obtain source document: {0}")]
    Source(#[from] SourceError),

    #[error("Failed to decode source document: {0}")]
    Decode(#[from] serde_json::Error),

    /// The upstream signature did not check out.
    #[error("Cannot verify source document signature: {0}")]
    Verify(#[from] VerifyError),

    #[error("Cannot patch document: {0}")]
    Patch(#[from] PatchError),

    #[error("Cannot sign document: {0}")]
    Sign(#[from] SigningError),

    #[error("Cannot write {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Refresh cancelled")]
    Cancelled,

    /// A previous self-verification failure stopped the coordinator.
    #[error("Refresh halted after a signing fault; restart required")]
    Halted,

    /// Reported to callers that waited on a refresh which then failed.
    #[error("Concurrent refresh failed: {0}")]
    Concurrent(String),
}

impl RefreshError {
    /// A freshly produced signature failed its own verification. The signing
    /// material cannot be trusted and refreshing stops.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Sign(e) if e.is_fatal())
    }

    pub(crate) fn persist(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persist {
            path: path.into(),
            source,
        }
    }
}

/// Invalid application configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Origin download URL must not be empty")]
    EmptyOrigin,

    #[error("New download URL must not be empty")]
    EmptyTarget,

    #[error("Source location must not be empty")]
    EmptySource,

    #[error("Cannot create data directory {}: {source}", path.display())]
    DataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
