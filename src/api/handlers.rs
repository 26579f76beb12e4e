//! API handlers
//!
//! Any answer from the backend is relayed as a 200 with its body streamed
//! through untouched, even when the backend itself reported an error. Only
//! a call that produced no answer at all turns into a 500 with the error
//! text.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::api::AppState;
use crate::client::BackendResponse;
use crate::query::search_body_bytes;
use crate::Error;

/// Cluster info passthrough
pub async fn info(State(state): State<AppState>) -> Response {
    match state.backend.info().await {
        Ok(upstream) => stream_upstream(upstream),
        Err(err) => upstream_error(err),
    }
}

/// Full-text search over the people index
///
/// A missing `q` searches for the empty string; when `q` is repeated the
/// first value wins.
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let q = params
        .iter()
        .find(|(key, _)| key == "q")
        .map(|(_, value)| value.as_str())
        .unwrap_or_default();
    let body = search_body_bytes(q);

    // Dropping this future on client disconnect also drops the upstream request.
    match state.backend.search(&state.index, body, true).await {
        Ok(upstream) => stream_upstream(upstream),
        Err(err) => upstream_error(err),
    }
}

fn stream_upstream(upstream: BackendResponse) -> Response {
    let BackendResponse {
        status,
        content_type,
        body,
    } = upstream;
    if !status.is_success() {
        tracing::warn!(%status, "Backend answered with an error, relaying it");
    }

    let mut response = Body::from_stream(body).into_response();
    *response.status_mut() = StatusCode::OK;
    if let Some(content_type) = content_type {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, content_type);
    }
    response
}

fn upstream_error(err: Error) -> Response {
    tracing::error!(error = %err, "Backend request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
}
