//! TTL cache in front of another source provider.
//!
//! The unwrapped payload is kept in a single data file. A background task
//! polls the wrapped provider once per TTL and downloads again only when its
//! metadata changed. Readers always see a complete file because new content
//! is staged next to the data file and renamed over it.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempPath;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::{FileMetadata, PeriodicTask, SourceBody, SourceError, SourceProvider};

pub struct CachedSource {
    shared: Arc<Shared>,
    worker: parking_lot::Mutex<Option<PeriodicTask>>,
}

struct Shared {
    source: Arc<dyn SourceProvider>,
    dir: PathBuf,
    state: RwLock<CacheState>,
    refreshing: Mutex<()>,
}

struct CacheState {
    metadata: Option<FileMetadata>,
    /// `None` once shut down.
    data: Option<TempPath>,
}

impl CachedSource {
    /// Prime the cache from `source`, then keep it fresh every `ttl`.
    pub async fn start(
        source: Arc<dyn SourceProvider>,
        ttl: Duration,
        dir: impl AsRef<Path>,
    ) -> Result<Self, SourceError> {
        let dir = dir.as_ref().to_path_buf();
        let data = tempfile::Builder::new()
            .prefix("cache-wrapper-")
            .suffix(".data")
            .tempfile_in(&dir)?
            .into_temp_path();
        debug!(path = %data.display(), "Cache data file created");

        let shared = Arc::new(Shared {
            source,
            dir,
            state: RwLock::new(CacheState {
                metadata: None,
                data: Some(data),
            }),
            refreshing: Mutex::new(()),
        });

        shared.refresh().await?;
        info!(source = %shared.source.describe(), ttl = ?ttl, "Source cache primed");

        let worker = shared.clone();
        let task = PeriodicTask::spawn("source-cache", ttl, move || {
            let worker = worker.clone();
            async move {
                if let Err(e) = worker.refresh().await {
                    warn!(source = %worker.source.describe(), error = %e, "Cache refresh failed");
                }
            }
        });

        Ok(Self {
            shared,
            worker: parking_lot::Mutex::new(Some(task)),
        })
    }

    /// Poll the wrapped provider now. Returns whether new content was stored.
    pub async fn refresh(&self) -> Result<bool, SourceError> {
        self.shared.refresh().await
    }

    /// Stop the background task and delete the data file.
    pub async fn shutdown(&self) {
        let task = self.worker.lock().take();
        if let Some(task) = task {
            task.stop().await;
        }

        let mut state = self.shared.state.write().await;
        state.metadata = None;
        if let Some(data) = state.data.take() {
            let path = data.to_path_buf();
            match data.close() {
                Ok(()) => debug!(path = %path.display(), "Cache data file removed"),
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove cache data file"),
            }
        }
    }
}

impl Shared {
    async fn refresh(&self) -> Result<bool, SourceError> {
        let _guard = self.refreshing.lock().await;

        let current = self.source.metadata().await?;
        {
            let state = self.state.read().await;
            if state.data.is_none() {
                return Err(SourceError::Closed);
            }
            if state.metadata.as_ref() == Some(&current) {
                debug!(source = %self.source.describe(), "Source unchanged");
                return Ok(false);
            }
        }

        let (metadata, mut body) = self.source.body().await?;
        let dir = self.dir.clone();
        let staged = tokio::task::spawn_blocking(move || -> io::Result<tempfile::NamedTempFile> {
            let mut staged = tempfile::Builder::new()
                .prefix("cache-wrapper-")
                .suffix(".tmp")
                .tempfile_in(&dir)?;
            io::copy(&mut body, &mut staged)?;
            staged.as_file().sync_all()?;
            Ok(staged)
        })
        .await
        .map_err(SourceError::join)??;

        let mut state = self.state.write().await;
        let Some(data) = state.data.as_ref() else {
            return Err(SourceError::Closed);
        };
        let target: &Path = data;
        staged.persist(target).map_err(|e| SourceError::Io(e.error))?;
        info!(source = %self.source.describe(), %metadata, "Source cached");
        state.metadata = Some(metadata);
        Ok(true)
    }
}

#[async_trait]
impl SourceProvider for CachedSource {
    async fn metadata(&self) -> Result<FileMetadata, SourceError> {
        let state = self.shared.state.read().await;
        state.metadata.clone().ok_or(SourceError::Closed)
    }

    async fn body(&self) -> Result<(FileMetadata, SourceBody), SourceError> {
        let state = self.shared.state.read().await;
        let (Some(metadata), Some(data)) = (&state.metadata, &state.data) else {
            return Err(SourceError::Closed);
        };
        let file = File::open(data)?;
        Ok((metadata.clone(), Box::new(file)))
    }

    fn describe(&self) -> String {
        format!("{} (cached)", self.shared.source.describe())
    }
}
