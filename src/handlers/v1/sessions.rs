//! Session lifecycle handlers.

use axum::extract::{Path as PathExtract, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{error, info};

use crate::handlers::problem_details;
use crate::server::AppState;

/// DELETE /api/v1/sessions/{session_id}
///
/// Drops the durable record and closes the transport. Deleting an
/// unknown session reports not found; the transport entry, if any, is
/// removed either way.
pub async fn delete_session(
    State(state): State<AppState>,
    PathExtract(session_id): PathExtract<String>,
) -> Response {
    match state.store.load(&session_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return problem_details::not_found("session not found"),
        Err(err) => {
            error!(error = %err, "failed to load session");
            return problem_details::internal_error("failed to load session");
        }
    }

    if let Err(err) = state.resolver.teardown(&session_id).await {
        error!(error = %err, "failed to tear down session");
        return problem_details::internal_error("failed to delete session");
    }

    info!(session_id = %session_id, "session deleted");
    StatusCode::NO_CONTENT.into_response()
}
