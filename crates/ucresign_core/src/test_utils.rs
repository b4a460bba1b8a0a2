use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Semaphore;
use ucresign_manifest::{Envelope, Manifest, Signature};
use ucresign_signing::{ManifestSigner, SignatureEngine, SigningError, VerifyError};
use ucresign_source::{FileMetadata, SourceBody, SourceError, SourceProvider};

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../tests/fixtures")
}

/// Unwrapped payload of a JSONP fixture under `update-center/`.
pub fn fixture_payload(name: &str) -> Vec<u8> {
    let data = std::fs::read(fixtures_dir().join("update-center").join(name)).unwrap();
    Envelope::Jsonp.strip_bytes(&data).unwrap().to_vec()
}

pub fn mirror_engine() -> SignatureEngine {
    let certs = fixtures_dir().join("certs");
    SignatureEngine::from_pem_files(None, &certs.join("mirror.crt"), &certs.join("mirror.key"), None).unwrap()
}

pub fn metadata(version: i64) -> FileMetadata {
    FileMetadata {
        last_modified: Utc.timestamp_opt(1_700_000_000 + version, 0).single(),
        size: Some(version as u64),
        etag: Some(format!("\"v{version}\"")),
    }
}

/// In-memory source whose content can be swapped, with call counters and an
/// optional gate that holds `body()` until permits are added.
pub struct FakeSource {
    content: parking_lot::Mutex<(FileMetadata, Vec<u8>)>,
    gate: Option<Arc<Semaphore>>,
    pub metadata_calls: AtomicUsize,
    pub body_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new(version: i64, payload: Vec<u8>) -> Arc<Self> {
        Arc::new(Self::build(version, payload, None))
    }

    pub fn gated(version: i64, payload: Vec<u8>, gate: Arc<Semaphore>) -> Arc<Self> {
        Arc::new(Self::build(version, payload, Some(gate)))
    }

    fn build(version: i64, payload: Vec<u8>, gate: Option<Arc<Semaphore>>) -> Self {
        Self {
            content: parking_lot::Mutex::new((metadata(version), payload)),
            gate,
            metadata_calls: AtomicUsize::new(0),
            body_calls: AtomicUsize::new(0),
        }
    }

    pub fn publish(&self, version: i64, payload: Vec<u8>) {
        *self.content.lock() = (metadata(version), payload);
    }

    pub fn body_calls(&self) -> usize {
        self.body_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceProvider for FakeSource {
    async fn metadata(&self) -> Result<FileMetadata, SourceError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.content.lock().0.clone())
    }

    async fn body(&self) -> Result<(FileMetadata, SourceBody), SourceError> {
        self.body_calls.fetch_add(1, Ordering::SeqCst);
        // The response is fixed when the request is made, as with HTTP.
        let (metadata, payload) = self.content.lock().clone();
        if let Some(gate) = &self.gate {
            gate.acquire().await.map_err(|_| SourceError::Closed)?.forget();
        }
        Ok((metadata, Box::new(Cursor::new(payload))))
    }

    fn describe(&self) -> String {
        "fake source".to_string()
    }
}

/// Verifies like the real engine but produces signatures that fail
/// self-verification.
pub struct BrokenSigner;

impl ManifestSigner for BrokenSigner {
    fn sign(&self, _manifest: &Manifest) -> Result<Signature, SigningError> {
        Err(SigningError::SelfVerification(VerifyError::MissingSignature))
    }

    fn verify(&self, manifest: &Manifest, signature: &Signature) -> Result<(), VerifyError> {
        ucresign_signing::verifier::verify_manifest(manifest, signature)
    }
}
