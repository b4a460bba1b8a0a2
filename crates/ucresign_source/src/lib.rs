//! # ucresign_source
//!
//! Where the upstream signed update-center document comes from.
//!
//! Every provider answers two questions: "has it changed?" through cheap
//! [`FileMetadata`], and "what is in it?" through a stream that already has
//! the JSONP/HTML wrapper stripped.

pub mod cache;
mod error;
pub mod local;
pub mod remote;
pub mod scheduler;

use std::fmt;
use std::io::Read;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use cache::CachedSource;
pub use error::SourceError;
pub use local::LocalFileSource;
pub use remote::{RemoteUrlSource, RemoteUrlSourceBuilder};
pub use scheduler::PeriodicTask;

/// Cheap change-detection data for a source document. Never used for
/// correctness, only to skip work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMetadata {
    pub last_modified: Option<DateTime<Utc>>,
    pub size: Option<u64>,
    pub etag: Option<String>,
}

impl fmt::Display for FileMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.size {
            Some(size) => write!(f, "{size} bytes")?,
            None => write!(f, "unknown size")?,
        }
        if let Some(modified) = self.last_modified {
            write!(f, ", last-modified {}", modified.to_rfc2822())?;
        }
        if let Some(etag) = &self.etag {
            write!(f, ", etag {etag}")?;
        }
        Ok(())
    }
}

/// Unwrapped JSON payload of a source document. Dropping it releases any
/// temporary file behind it.
pub type SourceBody = Box<dyn Read + Send>;

/// A place the upstream document can be read from.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Current metadata, without transferring the document.
    async fn metadata(&self) -> Result<FileMetadata, SourceError>;

    /// Metadata and payload of the document as it is now.
    async fn body(&self) -> Result<(FileMetadata, SourceBody), SourceError>;

    /// Human readable location for logs.
    fn describe(&self) -> String;
}
