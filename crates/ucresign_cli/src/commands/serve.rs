//! HTTP server command

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use miette::{IntoDiagnostic, Result, WrapErr};
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use ucresign_core::{UPDATE_CENTER_HTML, UPDATE_CENTER_JSON, UpdateCenter};
use ucresign_manifest::Envelope;

use crate::cli::ServeArgs;
use crate::commands::start;
use crate::proxy::Proxy;
use crate::utils::{create_tokio_runtime, shutdown_signal};

/// Tool installer metadata is not mirrored.
const UNSERVED_PREFIXES: [&str; 2] = ["/updates/hudson.tasks.", "/updates/hudson.tools."];

#[derive(Clone)]
struct AppState {
    center: Arc<UpdateCenter>,
    proxy: Proxy,
    shutdown: CancellationToken,
}

pub fn run_serve(args: ServeArgs) -> Result<()> {
    create_tokio_runtime()?.block_on(serve(args))
}

async fn serve(args: ServeArgs) -> Result<()> {
    let app = start(args.app.to_config()).await?;
    let proxy = Proxy::new(&app.config.patch.new_download_url).into_diagnostic()?;

    let shutdown = CancellationToken::new();
    let signals = tokio::spawn(shutdown_signal(shutdown.clone()));

    let state = AppState {
        center: app.center.clone(),
        proxy,
        shutdown: shutdown.clone(),
    };
    warm_up(&state);

    let host = if args.server_addr.is_empty() {
        "0.0.0.0"
    } else {
        args.server_addr.as_str()
    };
    let listener = TcpListener::bind((host, args.listen_port))
        .await
        .into_diagnostic()
        .wrap_err_with(|| format!("Cannot listen on {host}:{}", args.listen_port))?;
    info!(address = %listener.local_addr().into_diagnostic()?, "Listening");

    let served = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await
        .into_diagnostic();

    shutdown.cancel();
    if let Ok(Err(e)) = signals.await {
        warn!("Signal handler failed: {e:?}");
    }

    app.source.shutdown().await;
    if let Err(e) = app.center.clean_up() {
        warn!(error = %e, "Cannot remove published artifacts");
    }
    info!("Server stopped");
    served
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(&format!("/{UPDATE_CENTER_JSON}"), get(update_center_jsonp))
        .route(&format!("/{UPDATE_CENTER_HTML}"), get(update_center_html))
        .fallback(proxy)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Refresh once in the background so the first client finds warm artifacts.
fn warm_up(state: &AppState) {
    let center = state.center.clone();
    let cancel = state.shutdown.child_token();
    tokio::spawn(async move {
        match center.refresh(&cancel).await {
            Ok(outcome) => info!(?outcome, "Initial refresh finished"),
            Err(e) => warn!(error = %e, "Initial refresh failed"),
        }
    });
}

async fn healthz(State(state): State<AppState>) -> Response {
    if state.center.is_halted() {
        (StatusCode::SERVICE_UNAVAILABLE, "halted").into_response()
    } else {
        (StatusCode::OK, "ok").into_response()
    }
}

async fn update_center_jsonp(State(state): State<AppState>) -> Response {
    serve_artifact(&state, Envelope::Jsonp).await
}

async fn update_center_html(State(state): State<AppState>) -> Response {
    serve_artifact(&state, Envelope::Html).await
}

async fn serve_artifact(state: &AppState, envelope: Envelope) -> Response {
    let cancel = state.shutdown.child_token();
    if let Err(e) = state.center.refresh(&cancel).await {
        if !state.center.has_artifacts() {
            error!(error = %e, "Refresh failed and nothing is published");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        warn!(error = %e, "Refresh failed, serving previous generation");
    }

    let paths = state.center.artifact_paths();
    let (path, content_type) = match envelope {
        Envelope::Html => (&paths.html, "text/html; charset=utf-8"),
        _ => (&paths.jsonp, "application/javascript"),
    };

    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) => {
            error!(path = %path.display(), error = %e, "Cannot open artifact");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let length = file.metadata().await.map(|m| m.len()).ok();

    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static(content_type));
    if let Some(length) = length {
        headers.insert(header::CONTENT_LENGTH, header::HeaderValue::from(length));
    }
    response
}

async fn proxy(State(state): State<AppState>, request: Request) -> Response {
    let path = request.uri().path();
    if UNSERVED_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) {
        return StatusCode::NOT_FOUND.into_response();
    }
    state.proxy.forward(request).await
}
