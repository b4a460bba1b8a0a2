//! Application configuration and assembly of the runtime components.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use ucresign_manifest::{Envelope, Patcher, UrlPatcher};
use ucresign_signing::{SignatureEngine, SigningError};
use ucresign_source::{
    CachedSource, LocalFileSource, RemoteUrlSource, SourceError, SourceProvider,
};

use crate::ConfigError;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_ORIGIN_DOWNLOAD_URL: &str = "https://updates.jenkins.io/";
pub const DEFAULT_DATA_DIR: &str = "/tmp/update-center-data";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Where the published artifacts and temporary files live.
    pub data_dir: PathBuf,
    pub source: SourceConfig,
    pub signer: SignerConfig,
    pub patch: PatchConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.source.validate()?;
        self.patch.validate()
    }

    /// Create the data directory if it is missing.
    pub fn prepare_data_dir(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_dir).map_err(|source| ConfigError::DataDir {
            path: self.data_dir.clone(),
            source,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    File(PathBuf),
    Url(String),
}

#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub location: SourceLocation,
    pub envelope: Envelope,
    /// Bound on one metadata lookup plus download and decode.
    pub fetch_timeout: Duration,
    /// Zero disables the cache in front of the source.
    pub cache_ttl: Duration,
}

impl SourceConfig {
    pub fn new(location: SourceLocation) -> Self {
        Self {
            location,
            envelope: Envelope::Jsonp,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let empty = match &self.location {
            SourceLocation::File(path) => path.as_os_str().is_empty(),
            SourceLocation::Url(url) => url.trim().is_empty(),
        };
        if empty {
            return Err(ConfigError::EmptySource);
        }
        Ok(())
    }

    /// Build the provider chain for this source. Temporary files go under
    /// `data_dir`.
    pub async fn open(&self, data_dir: &Path) -> Result<SourceHandle, SourceError> {
        let provider: Arc<dyn SourceProvider> = match &self.location {
            SourceLocation::File(path) => {
                Arc::new(LocalFileSource::new(path.clone())?.with_envelope(self.envelope))
            }
            SourceLocation::Url(url) => Arc::new(
                RemoteUrlSource::builder(url.clone())
                    .timeout(self.fetch_timeout)
                    .envelope(self.envelope)
                    .temp_dir(data_dir)
                    .build()?,
            ),
        };
        info!(source = %provider.describe(), envelope = %self.envelope, "Source configured");

        if self.cache_ttl.is_zero() {
            return Ok(SourceHandle {
                provider,
                cache: None,
            });
        }

        let cache = Arc::new(CachedSource::start(provider, self.cache_ttl, data_dir).await?);
        Ok(SourceHandle {
            provider: cache.clone(),
            cache: Some(cache),
        })
    }
}

/// The configured provider, plus the cache in front of it when enabled.
pub struct SourceHandle {
    provider: Arc<dyn SourceProvider>,
    cache: Option<Arc<CachedSource>>,
}

impl SourceHandle {
    pub fn provider(&self) -> Arc<dyn SourceProvider> {
        self.provider.clone()
    }

    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    /// Stop background work and remove cached data.
    pub async fn shutdown(&self) {
        if let Some(cache) = &self.cache {
            cache.shutdown().await;
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignerConfig {
    pub ca_path: Option<PathBuf>,
    pub certificate_path: PathBuf,
    pub key_path: PathBuf,
    pub key_password: Option<String>,
}

impl SignerConfig {
    pub fn load(&self) -> Result<SignatureEngine, SigningError> {
        let engine = SignatureEngine::from_pem_files(
            self.ca_path.as_deref(),
            &self.certificate_path,
            &self.key_path,
            self.key_password.as_deref(),
        )?;
        Ok(engine)
    }
}

/// Download URL rewrite. Both prefixes are stored without a trailing slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchConfig {
    pub origin_download_url: String,
    pub new_download_url: String,
}

impl PatchConfig {
    pub fn new(origin: &str, new: &str) -> Self {
        Self {
            origin_download_url: trim_slash(origin).to_string(),
            new_download_url: trim_slash(new).to_string(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.origin_download_url.is_empty() {
            return Err(ConfigError::EmptyOrigin);
        }
        if self.new_download_url.is_empty() {
            return Err(ConfigError::EmptyTarget);
        }
        Ok(())
    }

    pub fn patchers(&self) -> Result<Vec<Box<dyn Patcher>>, ConfigError> {
        self.validate()?;
        let patcher = UrlPatcher::new(&self.origin_download_url, &self.new_download_url)
            .map_err(|_| ConfigError::EmptyOrigin)?;
        Ok(vec![Box::new(patcher)])
    }
}

fn trim_slash(url: &str) -> &str {
    url.strip_suffix('/').unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("https://updates.jenkins.io/", "https://updates.jenkins.io")]
    #[case("https://updates.jenkins.io", "https://updates.jenkins.io")]
    #[case("https://mirror.example.com/jenkins//", "https://mirror.example.com/jenkins/")]
    #[case("/", "")]
    fn trims_one_trailing_slash(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(PatchConfig::new(input, "x").origin_download_url, expected);
    }

    #[test]
    fn rejects_empty_prefixes() {
        assert!(matches!(PatchConfig::new("/", "https://m").patchers(), Err(ConfigError::EmptyOrigin)));
        assert!(matches!(
            PatchConfig::new("https://updates.jenkins.io/", "").patchers(),
            Err(ConfigError::EmptyTarget)
        ));
        assert_eq!(
            PatchConfig::new("https://updates.jenkins.io/", "https://m/").patchers().unwrap().len(),
            1
        );
    }

    fn app_config(dir: &Path, location: SourceLocation) -> AppConfig {
        AppConfig {
            data_dir: dir.join("nested/data"),
            source: SourceConfig::new(location),
            signer: SignerConfig {
                ca_path: None,
                certificate_path: "cert.pem".into(),
                key_path: "key.pem".into(),
                key_password: None,
            },
            patch: PatchConfig::new(DEFAULT_ORIGIN_DOWNLOAD_URL, "https://mirror.example.com/"),
        }
    }

    #[test]
    fn validates_source_location() {
        let dir = tempfile::tempdir().unwrap();
        assert!(app_config(dir.path(), SourceLocation::Url("https://u/uc.json".into())).validate().is_ok());
        assert!(matches!(
            app_config(dir.path(), SourceLocation::Url("  ".into())).validate(),
            Err(ConfigError::EmptySource)
        ));
        assert!(matches!(
            app_config(dir.path(), SourceLocation::File(PathBuf::new())).validate(),
            Err(ConfigError::EmptySource)
        ));
    }

    #[test]
    fn creates_data_dir_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let config = app_config(dir.path(), SourceLocation::Url("https://u/uc.json".into()));

        config.prepare_data_dir().unwrap();
        assert!(config.data_dir.is_dir());
        config.prepare_data_dir().unwrap();
    }

    #[tokio::test]
    async fn opens_local_source_with_and_without_cache() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("update-center.json");
        std::fs::write(&file, Envelope::Jsonp.wrap(b"{}")).unwrap();

        let mut config = SourceConfig::new(SourceLocation::File(file));
        config.cache_ttl = Duration::ZERO;
        let direct = config.open(dir.path()).await.unwrap();
        assert!(!direct.is_cached());

        config.cache_ttl = Duration::from_secs(60);
        let cached = config.open(dir.path()).await.unwrap();
        assert!(cached.is_cached());
        assert!(cached.provider().describe().ends_with("(cached)"));
        cached.shutdown().await;
    }

    #[tokio::test]
    async fn missing_local_source_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = SourceConfig::new(SourceLocation::File(dir.path().join("absent.json")));
        assert!(matches!(config.open(dir.path()).await, Err(SourceError::NotFound(_))));
    }
}
