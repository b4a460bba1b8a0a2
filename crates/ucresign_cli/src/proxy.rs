//! Reverse proxy for everything the mirror does not serve itself.

use std::time::Duration;

use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderMap, HeaderName, StatusCode, header};
use axum::response::{IntoResponse, Response};
use reqwest::redirect;
use tracing::{info, warn};
use url::Url;

/// Largest request body forwarded upstream.
const MAX_REQUEST_BODY: usize = 16 * 1024 * 1024;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::HOST,
];

#[derive(Debug, Clone)]
pub struct Proxy {
    client: reqwest::Client,
    target: Url,
}

impl Proxy {
    pub fn new(target: &str) -> Result<Self, ProxyError> {
        let target = Url::parse(target).map_err(|e| ProxyError::InvalidTarget(format!("{target}: {e}")))?;
        if !matches!(target.scheme(), "http" | "https") {
            return Err(ProxyError::InvalidTarget(format!("{target}: unsupported scheme")));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(ProxyError::Client)?;
        Ok(Self { client, target })
    }

    /// Upstream URL for a request path and query.
    pub fn target_url(&self, path: &str, query: Option<&str>) -> Url {
        let mut url = self.target.clone();
        let joined = join_path(self.target.path(), path);
        url.set_path(&joined);
        let merged = match (self.target.query(), query) {
            (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => Some(format!("{a}&{b}")),
            (Some(a), _) if !a.is_empty() => Some(a.to_string()),
            (_, Some(b)) if !b.is_empty() => Some(b.to_string()),
            _ => None,
        };
        url.set_query(merged.as_deref());
        url
    }

    pub async fn forward(&self, request: Request) -> Response {
        let (parts, body) = request.into_parts();
        let url = self.target_url(parts.uri.path(), parts.uri.query());
        info!(method = %parts.method, %url, "Proxying request");

        let body = match axum::body::to_bytes(body, MAX_REQUEST_BODY).await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Cannot read request body");
                return StatusCode::PAYLOAD_TOO_LARGE.into_response();
            }
        };

        let mut headers = strip_hop_by_hop(&parts.headers);
        headers.remove(header::CONTENT_LENGTH);

        let upstream = match self
            .client
            .request(parts.method, url.clone())
            .headers(headers)
            .body(body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(%url, error = %e, "Upstream request failed");
                return StatusCode::BAD_GATEWAY.into_response();
            }
        };

        let status = upstream.status();
        let headers = strip_hop_by_hop(upstream.headers());
        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut out = headers.clone();
    for name in &HOP_BY_HOP {
        out.remove(name);
    }
    out.remove("keep-alive");
    out
}

fn join_path(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{base}{}", &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Invalid proxy target: {0}")]
    InvalidTarget(String),

    #[error("Cannot build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}
