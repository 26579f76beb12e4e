//! HTTP API server

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Request, StatusCode},
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    timeout::{RequestBodyTimeoutLayer, TimeoutLayer},
    trace::TraceLayer,
};
use tracing::Span;

use crate::config::ServerSection;

pub mod handlers;
pub mod state;

pub use state::AppState;

/// Build the API router using the provided application state
///
/// The read timeout bounds the request body and the write timeout bounds the
/// time until the response head is ready. Header reads and idle keep-alive
/// connections are bounded per connection in [`crate::server`].
pub fn create_router(state: AppState, server: &ServerSection) -> Router {
    Router::new()
        .route("/", get(handlers::info))
        .route("/search", get(handlers::search))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(request_span)
                        .on_request(|_request: &Request<Body>, _span: &Span| {
                            tracing::info!("Handling request");
                        }),
                )
                .layer(RequestBodyTimeoutLayer::new(server.read_timeout()))
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    server.write_timeout(),
                )),
        )
        .with_state(state)
}

fn request_span(request: &Request<Body>) -> Span {
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".to_string());
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-");

    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        remote = %remote,
        user_agent = %user_agent,
    )
}
