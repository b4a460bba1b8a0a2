//! Refresh coordinator: fetch, verify, patch, re-sign and publish.

use std::future::Future;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tempfile::NamedTempFile;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use ucresign_manifest::{Envelope, Patcher, SignedManifest, canonical, patcher};
use ucresign_signing::{ManifestSigner, SigningError, VerifyError};
use ucresign_source::{FileMetadata, SourceError, SourceProvider};

use crate::RefreshError;

/// File name of the JSONP artifact.
pub const UPDATE_CENTER_JSON: &str = "update-center.json";
/// File name of the HTML artifact.
pub const UPDATE_CENTER_HTML: &str = "update-center.json.html";

/// How a call to [`UpdateCenter::refresh`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Source metadata matches the published generation.
    Unchanged,
    /// A new generation was published.
    Updated { metadata: FileMetadata },
    /// Another caller's refresh completed while this one waited.
    Joined,
}

/// Locations of the two published artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub jsonp: PathBuf,
    pub html: PathBuf,
}

impl ArtifactPaths {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            jsonp: data_dir.join(UPDATE_CENTER_JSON),
            html: data_dir.join(UPDATE_CENTER_HTML),
        }
    }

    fn iter(&self) -> [(&Path, Envelope); 2] {
        [(&self.jsonp, Envelope::Jsonp), (&self.html, Envelope::Html)]
    }
}

/// Bookkeeping for callers that queue behind a running refresh.
#[derive(Debug, Default)]
struct FlightRecord {
    /// Number of completed cycles.
    generation: u64,
    /// Error message of the most recent cycle, if it failed.
    failure: Option<String>,
}

/// Keeps the re-signed artifacts in `data_dir` in step with the source.
///
/// At most one cycle runs at a time. Artifacts are replaced by rename, so a
/// reader sees either the previous generation or the new one, never a mix.
pub struct UpdateCenter {
    data_dir: PathBuf,
    paths: ArtifactPaths,
    fetch_timeout: Duration,
    source: Arc<dyn SourceProvider>,
    signer: Arc<dyn ManifestSigner>,
    patchers: Vec<Box<dyn Patcher>>,

    /// Source metadata of the published generation.
    baseline: parking_lot::RwLock<Option<FileMetadata>>,
    flight: tokio::sync::Mutex<()>,
    record: parking_lot::Mutex<FlightRecord>,
    halted: AtomicBool,
}

impl UpdateCenter {
    pub fn new(
        data_dir: impl Into<PathBuf>,
        fetch_timeout: Duration,
        source: Arc<dyn SourceProvider>,
        signer: Arc<dyn ManifestSigner>,
        patchers: Vec<Box<dyn Patcher>>,
    ) -> Self {
        let data_dir = data_dir.into();
        Self {
            paths: ArtifactPaths::new(&data_dir),
            data_dir,
            fetch_timeout,
            source,
            signer,
            patchers,
            baseline: parking_lot::RwLock::new(None),
            flight: tokio::sync::Mutex::new(()),
            record: parking_lot::Mutex::new(FlightRecord::default()),
            halted: AtomicBool::new(false),
        }
    }

    pub fn artifact_paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    /// Both artifacts of a generation are present.
    pub fn has_artifacts(&self) -> bool {
        self.paths.jsonp.is_file() && self.paths.html.is_file()
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    /// Metadata of the source document behind the current artifacts.
    pub fn baseline(&self) -> Option<FileMetadata> {
        self.baseline.read().clone()
    }

    /// Bring the artifacts up to date with the source.
    ///
    /// Cheap when nothing changed: only source metadata is consulted. On any
    /// error the previous artifacts are left untouched.
    pub async fn refresh(&self, cancel: &CancellationToken) -> Result<RefreshOutcome, RefreshError> {
        if self.is_halted() {
            return Err(RefreshError::Halted);
        }

        let seen = self.record.lock().generation;
        let deadline = Instant::now() + self.fetch_timeout;
        let current = self
            .bounded(cancel, deadline, async {
                self.source.metadata().await.map_err(RefreshError::from)
            })
            .await?;
        if self.is_current(&current) {
            debug!(metadata = %current, "Source unchanged");
            return Ok(RefreshOutcome::Unchanged);
        }
        info!(metadata = %current, "Source changed");

        let _flight = tokio::select! {
            _ = cancel.cancelled() => return Err(RefreshError::Cancelled),
            guard = self.flight.lock() => guard,
        };

        {
            let record = self.record.lock();
            if record.generation != seen {
                if let Some(message) = &record.failure {
                    return Err(RefreshError::Concurrent(message.clone()));
                }
                if self.is_current(&current) {
                    return Ok(RefreshOutcome::Joined);
                }
                debug!(metadata = %current, "Completed refresh published an older document");
            }
        }
        if self.is_halted() {
            return Err(RefreshError::Halted);
        }

        let result = self.run_cycle(cancel, deadline).await;

        let mut record = self.record.lock();
        record.generation += 1;
        record.failure = result.as_ref().err().map(ToString::to_string);
        result
    }

    /// Remove the published artifacts. Missing files are not an error.
    pub fn clean_up(&self) -> io::Result<()> {
        for (path, _) in self.paths.iter() {
            match std::fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "Artifact removed"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        *self.baseline.write() = None;
        Ok(())
    }

    fn is_current(&self, metadata: &FileMetadata) -> bool {
        if self.baseline.read().as_ref() != Some(metadata) {
            return false;
        }
        if !self.has_artifacts() {
            info!("Published artifacts missing, forcing update");
            return false;
        }
        true
    }

    /// Run `fut` unless `cancel` fires or `deadline` passes first.
    async fn bounded<T, F>(&self, cancel: &CancellationToken, deadline: Instant, fut: F) -> Result<T, RefreshError>
    where
        F: Future<Output = Result<T, RefreshError>>,
    {
        tokio::select! {
            _ = cancel.cancelled() => Err(RefreshError::Cancelled),
            result = tokio::time::timeout_at(deadline, fut) => match result {
                Ok(inner) => inner,
                Err(_) => Err(SourceError::Timeout(self.fetch_timeout).into()),
            },
        }
    }

    async fn run_cycle(&self, cancel: &CancellationToken, deadline: Instant) -> Result<RefreshOutcome, RefreshError> {
        let (metadata, signed) = self.bounded(cancel, deadline, self.fetch()).await?;
        info!(
            source = %self.source.describe(),
            version = signed.manifest.update_center_version().unwrap_or("unknown"),
            plugins = signed.manifest.plugin_count(),
            "Source document downloaded"
        );

        let SignedManifest {
            mut manifest,
            signature,
        } = signed;
        let signature = signature.ok_or(VerifyError::MissingSignature)?;
        self.signer.verify(&manifest, &signature)?;
        debug!("Source signature verified");

        patcher::apply_all(&self.patchers, &mut manifest)?;

        let signature = match self.signer.sign(&manifest) {
            Ok(signature) => signature,
            Err(e) => {
                if e.is_fatal() {
                    self.halted.store(true, Ordering::Release);
                    error!(error = %e, "Re-signed document failed verification, refusing further refreshes");
                }
                return Err(e.into());
            }
        };

        let payload = canonical::to_vec(&SignedManifest::new(manifest, signature)).map_err(SigningError::from)?;

        if cancel.is_cancelled() {
            return Err(RefreshError::Cancelled);
        }

        let dir = self.data_dir.clone();
        let paths = self.paths.clone();
        tokio::task::spawn_blocking(move || publish(&dir, &paths, &payload))
            .await
            .map_err(|e| RefreshError::persist(&self.data_dir, io::Error::other(e)))??;

        *self.baseline.write() = Some(metadata.clone());
        info!(metadata = %metadata, "Published re-signed update center");
        Ok(RefreshOutcome::Updated { metadata })
    }

    async fn fetch(&self) -> Result<(FileMetadata, SignedManifest), RefreshError> {
        let (metadata, body) = self.source.body().await?;
        let signed = tokio::task::spawn_blocking(move || serde_json::from_reader::<_, SignedManifest>(BufReader::new(body)))
            .await
            .map_err(|e| SourceError::Io(io::Error::other(e)))??;
        Ok((metadata, signed))
    }
}

/// Stage both artifacts in `dir`, then rename them into place.
///
/// When a rename fails, artifacts already renamed are put back so the
/// published pair always belongs to one generation.
fn publish(dir: &Path, paths: &ArtifactPaths, payload: &[u8]) -> Result<(), RefreshError> {
    let mut staged = Vec::with_capacity(2);
    for (path, envelope) in paths.iter() {
        let file = stage(dir, envelope, payload).map_err(|e| RefreshError::persist(path, e))?;
        let previous = back_up(dir, path).map_err(|e| RefreshError::persist(path, e))?;
        staged.push((file, previous, path));
    }

    let mut replaced = Vec::with_capacity(staged.len());
    for (file, previous, path) in staged {
        if let Err(e) = file.persist(path) {
            roll_back(replaced);
            return Err(RefreshError::persist(path, e.error));
        }
        debug!(path = %path.display(), "Artifact saved");
        replaced.push((previous, path));
    }
    Ok(())
}

/// Copy the currently published artifact at `path`, if any.
fn back_up(dir: &Path, path: &Path) -> io::Result<Option<NamedTempFile>> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Ok(None),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    }
    let mut current = File::open(path)?;
    let mut copy = NamedTempFile::new_in(dir)?;
    io::copy(&mut current, copy.as_file_mut())?;
    Ok(Some(copy))
}

fn roll_back(replaced: Vec<(Option<NamedTempFile>, &Path)>) {
    for (previous, path) in replaced.into_iter().rev() {
        let restored = match previous {
            Some(file) => file.persist(path).map(drop).map_err(|e| e.error),
            None => std::fs::remove_file(path),
        };
        match restored {
            Ok(()) => warn!(path = %path.display(), "Artifact rolled back"),
            Err(e) => error!(
                path = %path.display(),
                error = %e,
                "Cannot roll back artifact, published files belong to different generations"
            ),
        }
    }
}

fn stage(dir: &Path, envelope: Envelope, payload: &[u8]) -> io::Result<NamedTempFile> {
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(envelope.prefix())?;
    file.write_all(payload)?;
    file.write_all(envelope.suffix())?;
    file.as_file().sync_all()?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{BrokenSigner, FakeSource, fixture_payload, fixtures_dir, mirror_engine};
    use pretty_assertions::assert_eq;
    use tokio::sync::Semaphore;
    use ucresign_manifest::UrlPatcher;
    use ucresign_signing::{CertificateInfo, verifier};

    const ORIGIN: &str = "https://updates.jenkins.io";
    const MIRROR: &str = "https://mirror.example.com/jenkins";

    fn center(dir: &Path, source: Arc<dyn SourceProvider>) -> UpdateCenter {
        center_with(dir, source, Arc::new(mirror_engine()), Duration::from_secs(10))
    }

    fn center_with(
        dir: &Path,
        source: Arc<dyn SourceProvider>,
        signer: Arc<dyn ManifestSigner>,
        timeout: Duration,
    ) -> UpdateCenter {
        let patcher: Box<dyn Patcher> = Box::new(UrlPatcher::new(ORIGIN, MIRROR).unwrap());
        UpdateCenter::new(dir, timeout, source, signer, vec![patcher])
    }

    fn read_published(path: &Path, envelope: Envelope) -> SignedManifest {
        let data = std::fs::read(path).unwrap();
        serde_json::from_slice(envelope.strip_bytes(&data).unwrap()).unwrap()
    }

    fn mirror_certificate() -> CertificateInfo {
        let pem = std::fs::read(fixtures_dir().join("certs/mirror.crt")).unwrap();
        CertificateInfo::from_pem(&pem).unwrap()
    }

    #[tokio::test]
    async fn publishes_patched_and_resigned_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeSource::new(1, fixture_payload("upstream-full.jsonp"));
        let center = center(dir.path(), source.clone());

        let outcome = center.refresh(&CancellationToken::new()).await.unwrap();
        assert_eq!(
            outcome,
            RefreshOutcome::Updated {
                metadata: crate::test_utils::metadata(1)
            }
        );
        assert!(center.has_artifacts());

        let original: SignedManifest = serde_json::from_slice(&fixture_payload("upstream-full.jsonp")).unwrap();
        let published = read_published(&center.artifact_paths().jsonp, Envelope::Jsonp);

        let urls: Vec<&str> = published.manifest.download_urls().collect();
        assert_eq!(urls.len(), 3);
        assert!(urls.iter().all(|u| u.starts_with(MIRROR)), "{urls:?}");
        assert_eq!(
            published.manifest.core.as_ref().unwrap().url(),
            Some("https://mirror.example.com/jenkins/download/war/2.400/jenkins.war")
        );

        // Everything except download URLs survives the round trip.
        let mut restored = published.manifest.clone();
        UrlPatcher::new(MIRROR, ORIGIN).unwrap().patch(&mut restored).unwrap();
        assert_eq!(restored, original.manifest);

        let signature = published.signature.unwrap();
        assert_eq!(signature.certificates.len(), 1);
        verifier::verify_manifest_with(&published.manifest, &signature, &mirror_certificate()).unwrap();

        let jsonp = std::fs::read(&center.artifact_paths().jsonp).unwrap();
        let html = std::fs::read(&center.artifact_paths().html).unwrap();
        assert_eq!(
            Envelope::Jsonp.strip_bytes(&jsonp).unwrap(),
            Envelope::Html.strip_bytes(&html).unwrap()
        );
    }

    #[tokio::test]
    async fn unchanged_source_is_not_downloaded_again() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeSource::new(1, fixture_payload("upstream.jsonp"));
        let center = center(dir.path(), source.clone());
        let cancel = CancellationToken::new();

        center.refresh(&cancel).await.unwrap();
        assert_eq!(center.refresh(&cancel).await.unwrap(), RefreshOutcome::Unchanged);
        assert_eq!(center.refresh(&cancel).await.unwrap(), RefreshOutcome::Unchanged);
        assert_eq!(source.body_calls(), 1);
    }

    #[tokio::test]
    async fn missing_artifacts_force_an_update() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeSource::new(1, fixture_payload("upstream.jsonp"));
        let center = center(dir.path(), source.clone());
        let cancel = CancellationToken::new();

        center.refresh(&cancel).await.unwrap();
        std::fs::remove_file(&center.artifact_paths().html).unwrap();

        assert!(matches!(center.refresh(&cancel).await, Ok(RefreshOutcome::Updated { .. })));
        assert_eq!(source.body_calls(), 2);
        assert!(center.has_artifacts());
    }

    #[tokio::test]
    async fn changed_source_is_republished() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeSource::new(1, fixture_payload("upstream.jsonp"));
        let center = center(dir.path(), source.clone());
        let cancel = CancellationToken::new();

        center.refresh(&cancel).await.unwrap();
        source.publish(2, fixture_payload("upstream-full.jsonp"));

        assert!(matches!(center.refresh(&cancel).await, Ok(RefreshOutcome::Updated { .. })));
        let published = read_published(&center.artifact_paths().jsonp, Envelope::Jsonp);
        assert_eq!(published.manifest.plugin_count(), 2);
        assert_eq!(center.baseline(), Some(crate::test_utils::metadata(2)));
    }

    #[tokio::test]
    async fn tampered_source_keeps_previous_generation() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeSource::new(1, fixture_payload("upstream-full.jsonp"));
        let center = center(dir.path(), source.clone());
        let cancel = CancellationToken::new();

        center.refresh(&cancel).await.unwrap();
        let before = std::fs::read(&center.artifact_paths().jsonp).unwrap();

        source.publish(2, fixture_payload("tampered.jsonp"));
        match center.refresh(&cancel).await {
            Err(RefreshError::Verify(VerifyError::DigestMismatch { .. })) => {}
            res => panic!("Expected DigestMismatch, got {:?}", res),
        }

        assert_eq!(std::fs::read(&center.artifact_paths().jsonp).unwrap(), before);
        assert_eq!(center.baseline(), Some(crate::test_utils::metadata(1)));

        // The failed generation is retried on the next call.
        assert!(center.refresh(&cancel).await.is_err());
        assert_eq!(source.body_calls(), 3);
    }

    #[tokio::test]
    async fn unsigned_source_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeSource::new(1, br#"{"updateCenterVersion":"1"}"#.to_vec());
        let center = center(dir.path(), source);

        match center.refresh(&CancellationToken::new()).await {
            Err(RefreshError::Verify(VerifyError::MissingSignature)) => {}
            res => panic!("Expected MissingSignature, got {:?}", res),
        }
        assert!(!center.has_artifacts());
    }

    #[tokio::test]
    async fn malformed_source_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let center = center(dir.path(), FakeSource::new(1, b"{not json".to_vec()));

        assert!(matches!(
            center.refresh(&CancellationToken::new()).await,
            Err(RefreshError::Decode(_))
        ));
    }

    async fn wait_for_body_call(source: &FakeSource) {
        while source.body_calls() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        // Let every other caller reach the flight lock.
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_download() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(Semaphore::new(0));
        let source = FakeSource::gated(1, fixture_payload("upstream.jsonp"), gate.clone());
        let center = Arc::new(center(dir.path(), source.clone()));

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let center = center.clone();
                tokio::spawn(async move { center.refresh(&CancellationToken::new()).await })
            })
            .collect();

        wait_for_body_call(&source).await;
        gate.add_permits(10);

        let mut updated = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                RefreshOutcome::Updated { .. } => updated += 1,
                RefreshOutcome::Joined | RefreshOutcome::Unchanged => {}
            }
        }
        assert_eq!(updated, 1);
        assert_eq!(source.body_calls(), 1);
    }

    #[tokio::test]
    async fn joiners_of_a_failed_refresh_see_its_error() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(Semaphore::new(0));
        let source = FakeSource::gated(1, b"{not json".to_vec(), gate.clone());
        let center = Arc::new(center(dir.path(), source.clone()));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let center = center.clone();
                tokio::spawn(async move { center.refresh(&CancellationToken::new()).await })
            })
            .collect();

        wait_for_body_call(&source).await;
        gate.add_permits(10);

        let mut decode = 0;
        let mut concurrent = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Err(RefreshError::Decode(_)) => decode += 1,
                Err(RefreshError::Concurrent(message)) => {
                    assert!(message.starts_with("Failed to decode"), "{message}");
                    concurrent += 1;
                }
                res => panic!("Unexpected outcome {:?}", res),
            }
        }
        assert_eq!((decode, concurrent), (1, 2));
        assert_eq!(source.body_calls(), 1);
    }

    #[tokio::test]
    async fn cancellation_aborts_the_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(Semaphore::new(0));
        let source = FakeSource::gated(1, fixture_payload("upstream.jsonp"), gate);
        let center = center(dir.path(), source);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        assert!(matches!(center.refresh(&cancel).await, Err(RefreshError::Cancelled)));
        assert!(!center.has_artifacts());
    }

    #[tokio::test]
    async fn slow_source_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(Semaphore::new(0));
        let source = FakeSource::gated(1, fixture_payload("upstream.jsonp"), gate);
        let center = center_with(
            dir.path(),
            source,
            Arc::new(mirror_engine()),
            Duration::from_millis(50),
        );

        match center.refresh(&CancellationToken::new()).await {
            Err(RefreshError::Source(SourceError::Timeout(t))) => assert_eq!(t, Duration::from_millis(50)),
            res => panic!("Expected Timeout, got {:?}", res),
        }
    }

    #[tokio::test]
    async fn self_verification_failure_halts() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeSource::new(1, fixture_payload("upstream.jsonp"));
        let center = center_with(dir.path(), source.clone(), Arc::new(BrokenSigner), Duration::from_secs(10));
        let cancel = CancellationToken::new();

        let err = center.refresh(&cancel).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(center.is_halted());

        source.publish(2, fixture_payload("upstream-full.jsonp"));
        assert!(matches!(center.refresh(&cancel).await, Err(RefreshError::Halted)));
        assert_eq!(source.body_calls(), 1);
    }

    #[tokio::test]
    async fn clean_up_removes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeSource::new(1, fixture_payload("upstream.jsonp"));
        let center = center(dir.path(), source.clone());

        center.refresh(&CancellationToken::new()).await.unwrap();
        center.clean_up().unwrap();

        assert!(!center.artifact_paths().jsonp.exists());
        assert!(!center.artifact_paths().html.exists());
        assert_eq!(center.baseline(), None);
        center.clean_up().unwrap();
    }

    #[test]
    fn artifact_names() {
        let paths = ArtifactPaths::new(Path::new("/data"));
        assert_eq!(paths.jsonp, PathBuf::from("/data/update-center.json"));
        assert_eq!(paths.html, PathBuf::from("/data/update-center.json.html"));
    }

    #[tokio::test]
    async fn waiter_with_newer_metadata_runs_its_own_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(Semaphore::new(0));
        let source = FakeSource::gated(1, fixture_payload("upstream.jsonp"), gate.clone());
        let center = Arc::new(center(dir.path(), source.clone()));

        let first = {
            let center = center.clone();
            tokio::spawn(async move { center.refresh(&CancellationToken::new()).await })
        };
        wait_for_body_call(&source).await;

        source.publish(2, fixture_payload("upstream-full.jsonp"));
        let second = {
            let center = center.clone();
            tokio::spawn(async move { center.refresh(&CancellationToken::new()).await })
        };
        while source.metadata_calls.load(std::sync::atomic::Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        gate.add_permits(10);

        assert_eq!(
            first.await.unwrap().unwrap(),
            RefreshOutcome::Updated {
                metadata: crate::test_utils::metadata(1)
            }
        );
        assert_eq!(
            second.await.unwrap().unwrap(),
            RefreshOutcome::Updated {
                metadata: crate::test_utils::metadata(2)
            }
        );
        assert_eq!(source.body_calls(), 2);
        assert_eq!(center.baseline(), Some(crate::test_utils::metadata(2)));
    }

    #[test]
    fn failed_rename_restores_previous_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path());
        std::fs::write(&paths.jsonp, b"previous generation").unwrap();
        // A non-empty directory cannot be replaced by a file.
        std::fs::create_dir(&paths.html).unwrap();
        std::fs::write(paths.html.join("keep"), b"x").unwrap();

        let err = publish(dir.path(), &paths, b"{}").unwrap_err();
        assert!(matches!(err, RefreshError::Persist { ref path, .. } if *path == paths.html), "{err:?}");
        assert_eq!(std::fs::read(&paths.jsonp).unwrap(), b"previous generation");

        let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(leftovers.len(), 2, "{leftovers:?}");
    }

    #[test]
    fn failed_rename_without_previous_artifacts_publishes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path());
        std::fs::create_dir(&paths.html).unwrap();
        std::fs::write(paths.html.join("keep"), b"x").unwrap();

        assert!(publish(dir.path(), &paths, b"{}").is_err());
        assert!(!paths.jsonp.exists());
    }
}
