use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::handlers::problem_details;
use crate::server::AppState;

pub async fn livez() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

#[derive(Serialize)]
pub struct ReadyzResponse {
    pub status: String,
    pub default_model: String,
}

/// Ready once at least one upstream model is configured.
pub async fn readyz(State(state): State<AppState>) -> Response {
    match state.models.resolve(None) {
        Ok(model) => Json(ReadyzResponse {
            status: "ok".to_string(),
            default_model: model.name,
        })
        .into_response(),
        Err(_) => problem_details::service_unavailable("no upstream model configured"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_livez() {
        let (status, body) = livez().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }
}
