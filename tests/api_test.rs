//! HTTP surface tests: request validation, problem details, session
//! teardown, and health probes.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use reqflow::mcp::ConnectParams;
use reqflow::session::SessionRecord;

mod common;
use common::{connection, test_harness, tool_spec, ScriptedTransport};

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn empty_message_is_rejected() {
    let harness = test_harness();

    let response = harness
        .app
        .oneshot(
            Request::post("/api/v1/chat")
                .header("content-type", "application/json")
                .body(Body::from(json!({"message": "   "}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/problem+json"
    );
    let json = body_json(response).await;
    assert_eq!(json["status"], 400);
    assert!(json.get("title").is_some());
}

#[tokio::test]
async fn invalid_json_body_is_rejected() {
    let harness = test_harness();

    let response = harness
        .app
        .oneshot(
            Request::post("/api/v1/chat")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"message": "#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn unknown_model_is_rejected() {
    let harness = test_harness();

    let response = harness
        .app
        .oneshot(
            Request::post("/api/v1/chat")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"message": "hi", "model": "no-such-model"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["status"], 400);
}

#[tokio::test]
async fn delete_unknown_session_is_not_found() {
    let harness = test_harness();

    let response = harness
        .app
        .oneshot(
            Request::delete("/api/v1/sessions/ses_missing")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/problem+json"
    );
    let json = body_json(response).await;
    assert_eq!(json["status"], 404);
}

#[tokio::test]
async fn delete_session_drops_record_and_transport() {
    let harness = test_harness();

    let now = chrono::Utc::now();
    let record = SessionRecord {
        id: "ses_gone".to_string(),
        connect: ConnectParams::Url {
            url: "http://tools.example/mcp".to_string(),
        },
        transport_id: Some("t_1".to_string()),
        tools: vec![tool_spec("search_web")],
        model: None,
        system_prompt: "You are a test assistant.".to_string(),
        reasoning_state: None,
        created_at: now,
        last_used_at: now,
    };
    harness.store.save(&record).await.unwrap();
    let transport = ScriptedTransport::new("t_1");
    harness
        .transports
        .insert("ses_gone", connection(transport, &["search_web"]).transport);

    let response = harness
        .app
        .clone()
        .oneshot(
            Request::delete("/api/v1/sessions/ses_gone")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(harness.store.load("ses_gone").await.unwrap().is_none());
    assert!(harness.transports.get("ses_gone").is_none());
}

#[tokio::test]
async fn livez_is_ok() {
    let harness = test_harness();

    let response = harness
        .app
        .oneshot(Request::get("/livez").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn readyz_reports_default_model() {
    let harness = test_harness();

    let response = harness
        .app
        .oneshot(Request::get("/readyz").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["default_model"], common::MOCK_MODEL);
}
