//! HTTP request handlers

use std::io;
use std::path::PathBuf;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::CONTENT_LENGTH;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Extension, Router};
use futures::TryStreamExt;
use serde::Deserialize;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use transfer_core::Token;
use transfer_relay::{SessionRegistry, Upstream};

use crate::sink::response_sink;
use crate::ConnectionAbort;

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Shared state for all handlers
#[derive(Clone)]
struct AppState {
    registry: SessionRegistry,
    landing_page: Option<PathBuf>,
}

/// Path parameters of `/up` and `/down`; any trailing segments are ignored
#[derive(Debug, Deserialize)]
struct TokenPath {
    token: String,
}

/// Create the router for the relay.
///
/// Requests must carry a [`ConnectionAbort`] extension, which the server's
/// connection loop provides.
pub fn router(registry: SessionRegistry, landing_page: Option<PathBuf>) -> Router {
    let state = AppState {
        registry,
        landing_page,
    };

    Router::new()
        .route("/", get(handle_index))
        .route("/newsession", get(handle_new_session))
        .route("/up/{token}", put(handle_up))
        .route("/up/{token}/{*rest}", put(handle_up))
        .route("/down/{token}", get(handle_down))
        .route("/down/{token}/{*rest}", get(handle_down))
        .with_state(state)
}

/// Serve the landing page
async fn handle_index(State(state): State<AppState>) -> Response {
    debug!("GET /");
    let Some(path) = state.landing_page else {
        return Html(INDEX_HTML).into_response();
    };

    match tokio::fs::read_to_string(&path).await {
        Ok(page) => Html(page).into_response(),
        Err(e) => {
            warn!("Failed to read landing page {:?}: {}", path, e);
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

/// Allocate a session and return its token as plain text
async fn handle_new_session(State(state): State<AppState>) -> Response {
    debug!("GET /newsession");
    match state.registry.create() {
        Ok(token) => token.into_string().into_response(),
        Err(e) => {
            error!("Failed to create session: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error when generating random token",
            )
                .into_response()
        }
    }
}

/// Attach the request body as the session's producer
async fn handle_up(
    State(state): State<AppState>,
    Path(TokenPath { token }): Path<TokenPath>,
    Extension(abort): Extension<ConnectionAbort>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let token = Token::from(token);
    debug!("PUT /up/{}", token.short());

    // Cancelled when hyper drops this handler, i.e. the uploader went away.
    let cancel = CancellationToken::new();
    let _disconnect = cancel.clone().drop_guard();

    let content_length = headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());
    let reader = StreamReader::new(body.into_data_stream().map_err(io::Error::other));
    let upstream = Upstream::new(reader).with_content_length(content_length);

    let result = state
        .registry
        .attach_producer(token.as_str(), cancel, upstream)
        .await;
    debug!("Session {} closing producer connection", token.short());

    match result {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => {
            warn!("Session {} producer failed: {}", token.short(), e);
            abort.drop_connection().await
        }
    }
}

/// Attach the response body as the session's consumer
async fn handle_down(
    State(state): State<AppState>,
    Path(TokenPath { token }): Path<TokenPath>,
    Extension(abort): Extension<ConnectionAbort>,
) -> Response {
    let token = Token::from(token);
    debug!("GET /down/{}", token.short());

    // Armed only until the response head is ready; after that the body stream
    // reports a vanished downloader as a write error.
    let cancel = CancellationToken::new();
    let disconnect = cancel.clone().drop_guard();

    let (sink, pending) = response_sink();
    let registry = state.registry.clone();
    let session_token = token.clone();
    tokio::spawn(async move {
        let result = registry
            .attach_consumer(session_token.as_str(), cancel, Box::new(sink))
            .await;
        match result {
            Ok(()) => debug!("Session {} closing consumer connection", session_token.short()),
            Err(e) => warn!("Session {} consumer failed: {}", session_token.short(), e),
        }
    });

    match pending.ready().await {
        Some(response) => {
            disconnect.disarm();
            response
        }
        None => abort.drop_connection().await,
    }
}
