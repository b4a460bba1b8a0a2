//! Source document on the local file system.

use std::fs::{File, Metadata};
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ucresign_manifest::Envelope;

use crate::{FileMetadata, SourceBody, SourceError, SourceProvider};

#[derive(Debug, Clone)]
pub struct LocalFileSource {
    path: PathBuf,
    envelope: Envelope,
}

impl LocalFileSource {
    /// Use the JSONP document at `path`. The file must exist.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, SourceError> {
        let path = path.into();
        let meta = std::fs::metadata(&path).map_err(|e| io_error(e, &path))?;
        if !meta.is_file() {
            return Err(SourceError::NotFound(format!("{} is not a file", path.display())));
        }
        Ok(Self {
            path,
            envelope: Envelope::Jsonp,
        })
    }

    pub fn with_envelope(mut self, envelope: Envelope) -> Self {
        self.envelope = envelope;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn io_error(err: io::Error, path: &Path) -> SourceError {
    if err.kind() == io::ErrorKind::NotFound {
        SourceError::NotFound(path.display().to_string())
    } else {
        SourceError::Io(err)
    }
}

fn file_metadata(meta: &Metadata) -> FileMetadata {
    FileMetadata {
        last_modified: meta.modified().ok().map(DateTime::<Utc>::from),
        size: Some(meta.len()),
        etag: None,
    }
}

#[async_trait]
impl SourceProvider for LocalFileSource {
    async fn metadata(&self) -> Result<FileMetadata, SourceError> {
        let meta = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| io_error(e, &self.path))?;
        Ok(file_metadata(&meta))
    }

    async fn body(&self) -> Result<(FileMetadata, SourceBody), SourceError> {
        let path = self.path.clone();
        let envelope = self.envelope;

        tokio::task::spawn_blocking(move || {
            let file = File::open(&path).map_err(|e| io_error(e, &path))?;
            let meta = file.metadata()?;
            let reader = envelope.strip_with_len(file, meta.len())?;
            Ok((file_metadata(&meta), Box::new(reader) as SourceBody))
        })
        .await
        .map_err(SourceError::join)?
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
