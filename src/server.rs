//! Web chat server.
//!
//! Serves a single embedded chat page plus a small JSON API. Each page load
//! creates a session; the conversation lives server-side under that id.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/` | Chat page |
//! | `GET`    | `/health` | Status, version, and index availability |
//! | `POST`   | `/api/sessions` | Create a session |
//! | `GET`    | `/api/sessions/{id}` | Transcript and retrieved excerpts |
//! | `DELETE` | `/api/sessions/{id}` | End a session |
//! | `POST`   | `/api/sessions/{id}/messages` | Ask a question |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "no session with id ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//! A question the tutor could not answer is not an HTTP error; it comes back
//! as a reply whose `status` is `unavailable` or `failed`.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::config::Config;
use crate::session::{SessionStore, SessionView};
use crate::tutor::{Reply, Tutor};

const INDEX_HTML: &str = include_str!("../assets/chat.html");

#[derive(Clone)]
pub struct AppState {
    tutor: Arc<Tutor>,
    sessions: Arc<SessionStore>,
}

impl AppState {
    pub fn new(tutor: Arc<Tutor>, sessions: Arc<SessionStore>) -> Self {
        Self { tutor, sessions }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/api/sessions", post(handle_create_session))
        .route(
            "/api/sessions/{id}",
            get(handle_get_session).delete(handle_delete_session),
        )
        .route("/api/sessions/{id}/messages", post(handle_message))
        .layer(cors)
        .with_state(state)
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(config: &Config, tutor: Arc<Tutor>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let sessions = Arc::new(SessionStore::new(
        config.conversation.strategy.clone(),
        config.server.session_ttl_secs,
    ));
    let app = router(AppState::new(tutor, sessions));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "web chat listening");
    println!("VidyaSetu web chat on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

fn parse_session_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| bad_request(format!("invalid session id: {}", raw)))
}

// ============ GET / ============

async fn handle_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    index_ready: bool,
    chunks: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let chunks = state.tutor.index().map(|i| i.len()).unwrap_or(0);
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        index_ready: state.tutor.is_ready(),
        chunks,
    })
}

// ============ Sessions ============

async fn handle_create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let handle = state
        .sessions
        .create()
        .await
        .map_err(|e| internal(e.to_string()))?;
    let view = handle.lock().await.view();
    Ok((StatusCode::CREATED, Json(view)))
}

async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    let id = parse_session_id(&id)?;
    let handle = state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| not_found(format!("no session with id {}", id)))?;
    let view = handle.lock().await.view();
    Ok(Json(view))
}

async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_session_id(&id)?;
    if state.sessions.remove(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(format!("no session with id {}", id)))
    }
}

// ============ POST /api/sessions/{id}/messages ============

#[derive(Deserialize)]
struct MessageRequest {
    question: String,
}

#[derive(Serialize)]
struct MessageResponse {
    reply: Reply,
    session: SessionView,
}

async fn handle_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = parse_session_id(&id)?;
    let question = request.question.trim();
    if question.is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    let handle = state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| not_found(format!("no session with id {}", id)))?;

    let mut session = handle.lock().await;
    let reply = session.ask(&state.tutor, question).await;
    let view = session.view();

    Ok(Json(MessageResponse {
        reply,
        session: view,
    }))
}
