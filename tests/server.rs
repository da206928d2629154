//! HTTP contract of the web chat, driven through the router directly.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{history_chapter, touch_pdfs, tutor_with, KeywordEmbedder, ScriptedChat};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use vidyasetu::index;
use vidyasetu::server::{router, AppState};
use vidyasetu::session::SessionStore;
use vidyasetu::tutor::UNAVAILABLE_MESSAGE;

async fn app_with_index(tmp: &TempDir, strategy: &str) -> Router {
    let books = tmp.path().join("books");
    touch_pdfs(&books, &["chapter1.pdf"]);
    let embedder = Arc::new(KeywordEmbedder::new());
    let index = index::load_or_build(
        &tmp.path().join("index.sqlite"),
        &books,
        &history_chapter(),
        embedder.as_ref(),
        16,
    )
    .await
    .unwrap();
    let tutor = tutor_with(index, embedder, Arc::new(ScriptedChat::new()));
    router(AppState::new(
        Arc::new(tutor),
        Arc::new(SessionStore::new(strategy, 3600)),
    ))
}

fn app_without_index() -> Router {
    let tutor = tutor_with(
        None,
        Arc::new(KeywordEmbedder::new()),
        Arc::new(ScriptedChat::new()),
    );
    router(AppState::new(
        Arc::new(tutor),
        Arc::new(SessionStore::new("local", 3600)),
    ))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            builder = builder.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn create_session(app: &Router) -> String {
    let (status, body) = send(app, "POST", "/api/sessions", None).await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_reports_index_state() {
    let (status, body) = send(&app_without_index(), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["index_ready"], false);

    let tmp = TempDir::new().unwrap();
    let (_, body) = send(&app_with_index(&tmp, "local").await, "GET", "/health", None).await;
    assert_eq!(body["index_ready"], true);
    assert_eq!(body["chunks"], 3);
}

#[tokio::test]
async fn test_index_page_is_served() {
    let response = app_without_index()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("Reference Documents"));
}

#[tokio::test]
async fn test_message_updates_transcript_and_sources() {
    let tmp = TempDir::new().unwrap();
    let app = app_with_index(&tmp, "local").await;
    let id = create_session(&app).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/sessions/{}/messages", id),
        Some(json!({ "question": "Where did river cities grow?" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"]["status"], "answered");
    assert_eq!(body["reply"]["text"], "answer-1");
    assert_eq!(body["session"]["transcript"].as_array().unwrap().len(), 2);
    assert_eq!(body["session"]["transcript"][0]["role"], "user");
    assert_eq!(
        body["session"]["sources"][0]["chunk"]["source_file"],
        "chapter1.pdf"
    );

    let (status, body) = send(&app, "GET", &format!("/api/sessions/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transcript"][1]["content"], "answer-1");
    assert_eq!(body["strategy"], "local");
}

#[tokio::test]
async fn test_unavailable_reply_is_not_an_http_error() {
    let app = app_without_index();
    let id = create_session(&app).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/sessions/{}/messages", id),
        Some(json!({ "question": "Anything?" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"]["status"], "unavailable");
    assert_eq!(body["reply"]["text"], UNAVAILABLE_MESSAGE);
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let tmp = TempDir::new().unwrap();
    let app = app_with_index(&tmp, "local").await;
    let a = create_session(&app).await;
    let b = create_session(&app).await;
    assert_ne!(a, b);

    send(
        &app,
        "POST",
        &format!("/api/sessions/{}/messages", a),
        Some(json!({ "question": "Tell me about trade" })),
    )
    .await;

    let (_, body) = send(&app, "GET", &format!("/api/sessions/{}", b), None).await;
    assert!(body["transcript"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_then_lookup_is_not_found() {
    let app = app_without_index();
    let id = create_session(&app).await;

    let (status, _) = send(&app, "DELETE", &format!("/api/sessions/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, "GET", &format!("/api/sessions/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_bad_requests_use_error_envelope() {
    let app = app_without_index();

    let (status, body) = send(&app, "GET", "/api/sessions/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let id = create_session(&app).await;
    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/sessions/{}/messages", id),
        Some(json!({ "question": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "question must not be empty");
}
