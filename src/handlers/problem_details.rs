//! RFC 7807 problem detail responses.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub const CONTENT_TYPE: &str = "application/problem+json";

#[derive(Debug, Serialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

fn problem(status: StatusCode, title: &str, detail: impl Into<String>) -> Response {
    let body = ProblemDetails {
        problem_type: "about:blank".to_string(),
        title: title.to_string(),
        status: status.as_u16(),
        detail: Some(detail.into()),
    };
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE));
    response
}

pub fn bad_request(detail: impl Into<String>) -> Response {
    problem(StatusCode::BAD_REQUEST, "Bad Request", detail)
}

pub fn not_found(detail: impl Into<String>) -> Response {
    problem(StatusCode::NOT_FOUND, "Not Found", detail)
}

pub fn bad_gateway(detail: impl Into<String>) -> Response {
    problem(StatusCode::BAD_GATEWAY, "Bad Gateway", detail)
}

pub fn service_unavailable(detail: impl Into<String>) -> Response {
    problem(StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable", detail)
}

pub fn internal_error(detail: impl Into<String>) -> Response {
    problem(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error", detail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sets_problem_json_content_type() {
        let response = not_found("missing");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            CONTENT_TYPE
        );
    }

    #[test]
    fn status_matches_body() {
        let response = bad_request("nope");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
