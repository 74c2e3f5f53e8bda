use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::handlers;
use crate::llm::ModelRegistry;
use crate::session::{SessionResolver, SessionStore};

// ============================================================================
// Application State
// ============================================================================

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SessionStore>,
    pub resolver: SessionResolver,
    pub models: ModelRegistry,
    pub keep_alive_interval_seconds: u64,
    pub turn_timeout_seconds: u64,
    pub max_connections: usize,
    pub max_body_bytes: usize,
}

// ============================================================================
// Server Setup
// ============================================================================

pub fn build_app(state: AppState, request_timeout_seconds: u64) -> Router {
    let max_connections = state.max_connections;
    let max_body_bytes = state.max_body_bytes;

    // SSE streaming route - no request timeout (the turn carries its own
    // ceiling and the stream its keep-alive)
    let streaming_routes = Router::new()
        .route("/chat", post(handlers::v1::chat))
        .with_state(state.clone());

    // Regular API routes - with request timeout
    let api_routes = Router::new()
        .route(
            "/sessions/{session_id}",
            delete(handlers::v1::delete_session),
        )
        .with_state(state.clone())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(request_timeout_seconds),
        ));

    let api_v1 = Router::new()
        .merge(streaming_routes)
        .merge(api_routes)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(ConcurrencyLimitLayer::new(max_connections));

    Router::new()
        .route("/livez", get(handlers::livez))
        .route("/readyz", get(handlers::readyz))
        .with_state(state)
        .nest("/api/v1", api_v1)
}
