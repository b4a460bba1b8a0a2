//! Source document behind an HTTP(S) URL.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use futures_util::StreamExt;
use reqwest::header::{ACCEPT_ENCODING, CONTENT_LENGTH, ETAG, HeaderMap, LAST_MODIFIED};
use reqwest::{Response, StatusCode, redirect};
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use ucresign_manifest::Envelope;
use url::Url;

use crate::{FileMetadata, SourceBody, SourceError, SourceProvider};

/// Default timeout for a single HTTP request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default maximum number of redirects.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Reads metadata with `HEAD` and downloads the document with `GET` into a
/// temporary file.
#[derive(Debug, Clone)]
pub struct RemoteUrlSource {
    url: Url,
    client: reqwest::Client,
    envelope: Envelope,
    temp_dir: Option<PathBuf>,
    timeout: Duration,
}

/// Builder for RemoteUrlSource.
#[derive(Debug)]
pub struct RemoteUrlSourceBuilder {
    url: String,
    timeout: Duration,
    max_redirects: usize,
    envelope: Envelope,
    temp_dir: Option<PathBuf>,
}

impl RemoteUrlSource {
    /// Create a new builder for `url`.
    pub fn builder(url: impl Into<String>) -> RemoteUrlSourceBuilder {
        RemoteUrlSourceBuilder {
            url: url.into(),
            timeout: DEFAULT_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            envelope: Envelope::Jsonp,
            temp_dir: None,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn request_error(&self, err: reqwest::Error) -> SourceError {
        if err.is_timeout() {
            SourceError::Timeout(self.timeout)
        } else {
            SourceError::Network(err)
        }
    }

    fn check_status(&self, response: Response) -> Result<Response, SourceError> {
        match response.status() {
            StatusCode::NOT_FOUND => Err(SourceError::NotFound(self.url.to_string())),
            status if !status.is_success() => Err(SourceError::Http(status)),
            _ => Ok(response),
        }
    }

    fn temp_file(&self) -> io::Result<tempfile::NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("update-center-remote-url.").suffix(".jsonp");
        match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
    }
}

impl RemoteUrlSourceBuilder {
    /// Set timeout for each HTTP request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set maximum number of redirects.
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    /// Set the wrapper the remote document is served in.
    pub fn envelope(mut self, envelope: Envelope) -> Self {
        self.envelope = envelope;
        self
    }

    /// Directory for downloaded temporary files.
    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Build the RemoteUrlSource.
    pub fn build(self) -> Result<RemoteUrlSource, SourceError> {
        let url = Url::parse(&self.url).map_err(|e| SourceError::InvalidUrl(format!("{}: {e}", self.url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SourceError::InvalidUrl(format!(
                "{}: unsupported scheme {}",
                self.url,
                url.scheme()
            )));
        }

        let max_redirects = self.max_redirects;
        let policy = redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() > max_redirects {
                return attempt.error(format!("more than {max_redirects} redirects"));
            }
            let from = attempt.previous().last().map(Url::as_str).unwrap_or_default();
            debug!(from, to = %attempt.url(), "Following redirect");
            attempt.follow()
        });

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .redirect(policy)
            .build()?;

        Ok(RemoteUrlSource {
            url,
            client,
            envelope: self.envelope,
            temp_dir: self.temp_dir,
            timeout: self.timeout,
        })
    }
}

/// Read `Last-Modified`, `Content-Length` and `ETag`. The length comes from
/// the header so `HEAD` and `GET` agree.
fn metadata_from_headers(headers: &HeaderMap) -> Result<FileMetadata, SourceError> {
    let header = |name| headers.get(name).and_then(|v| v.to_str().ok());

    let last_modified = header(LAST_MODIFIED)
        .map(|text| {
            parse_http_date(text)
                .map_err(|e| SourceError::InvalidMetadata(format!("Last-Modified {text:?}: {e}")))
        })
        .transpose()?;

    let size = header(CONTENT_LENGTH)
        .map(|text| {
            text.parse::<u64>()
                .map_err(|e| SourceError::InvalidMetadata(format!("Content-Length {text:?}: {e}")))
        })
        .transpose()?;

    Ok(FileMetadata {
        last_modified,
        size,
        etag: header(ETAG).map(str::to_string),
    })
}

/// HTTP dates come in three formats: IMF-fixdate (RFC 1123), the obsolete
/// RFC 850 form, and ANSI C `asctime()`. All of them are in GMT.
const OBSOLETE_DATE_FORMATS: [&str; 2] = ["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"];

fn parse_http_date(text: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let text = text.trim();
    let err = match DateTime::parse_from_rfc2822(text) {
        Ok(dt) => return Ok(dt.with_timezone(&Utc)),
        Err(e) => e,
    };
    OBSOLETE_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or(err)
}

/// Downloaded document; the file is deleted when this is dropped.
struct TempFileBody {
    file: File,
    _path: TempPath,
}

impl Read for TempFileBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Seek for TempFileBody {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

#[async_trait]
impl SourceProvider for RemoteUrlSource {
    async fn metadata(&self) -> Result<FileMetadata, SourceError> {
        debug!(url = %self.url, "HEAD");
        let response = self
            .client
            .head(self.url.clone())
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        let response = self.check_status(response)?;
        metadata_from_headers(response.headers())
    }

    async fn body(&self) -> Result<(FileMetadata, SourceBody), SourceError> {
        debug!(url = %self.url, "GET");
        let response = self
            .client
            .get(self.url.clone())
            .header(ACCEPT_ENCODING, "identity")
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        let response = self.check_status(response)?;
        let metadata = metadata_from_headers(response.headers())?;

        let (file, path) = self.temp_file()?.into_parts();
        debug!(path = %path.display(), "Temporary file created");

        let mut out = tokio::fs::File::from_std(file);
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.request_error(e))?;
            out.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        out.flush().await?;
        let file = out.into_std().await;

        let envelope = self.envelope;
        let body = TempFileBody { file, _path: path };
        let reader = tokio::task::spawn_blocking(move || envelope.strip_with_len(body, written))
            .await
            .map_err(SourceError::join)??;

        Ok((metadata, Box::new(reader)))
    }

    fn describe(&self) -> String {
        self.url.to_string()
    }
}
