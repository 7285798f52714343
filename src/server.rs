//! HTTP API surface.
//!
//! Exposes the chat and document-processing pipeline as a JSON API for the
//! web client.
//!
//! # Endpoints
//!
//! | Method   | Path | Description |
//! |----------|------|-------------|
//! | `POST`   | `/chat` | Answer a question, grounded in uploaded documents |
//! | `POST`   | `/documents/{id}/process` | Extract text + metadata for a stored document |
//! | `GET`    | `/documents` | List documents |
//! | `GET`    | `/documents/{id}` | Fetch one document with content and metadata |
//! | `DELETE` | `/documents/{id}` | Delete a document and its stored file |
//! | `GET`    | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Error responses carry `{ "error": "<message>" }` with a non-2xx status:
//! `400` for bad input (missing message, unsupported file type), `401` when
//! a server token is configured and the bearer token is missing or wrong,
//! `404` for unknown documents or missing stored files, `500` for upstream
//! generation failures and internal errors.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted; the browser client is
//! served from a different origin.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::chat::{answer_chat, ChatError, ChatRequest};
use crate::config::Config;
use crate::generation::{GenerationBackend, HttpGenerationClient};
use crate::models::{Document, DocumentMeta};
use crate::process::{process_document, ProcessError};
use crate::storage::BlobStore;
use crate::{db, store};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    pool: sqlx::SqlitePool,
    blobs: BlobStore,
    generator: Arc<dyn GenerationBackend>,
}

/// Starts the HTTP server with the production generation backend.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let generator = Arc::new(HttpGenerationClient::new(config.generation.clone()));
    run_server_with_backend(config, generator).await
}

/// Like [`run_server`], but with a caller-supplied generation backend.
pub async fn run_server_with_backend(
    config: &Config,
    generator: Arc<dyn GenerationBackend>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let pool = db::connect(config).await?;
    crate::migrate::apply(&pool).await?;

    let state = AppState {
        config: Arc::new(config.clone()),
        blobs: BlobStore::new(&config.storage.root),
        pool,
        generator,
    };

    let app = router(state);

    println!("grantmuse API listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/chat", post(handle_chat))
        .route("/documents", get(handle_list_documents))
        .route(
            "/documents/{id}",
            get(handle_get_document).delete(handle_delete_document),
        )
        .route("/documents/{id}/process", post(handle_process_document))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

/// JSON error body: `{ "error": "<message>" }`.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

fn unauthorized() -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        message: "invalid or missing bearer token".to_string(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: message.into(),
    }
}

/// When a server token is configured, every data route requires
/// `Authorization: Bearer <token>`.
fn check_auth(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let expected = match &state.config.server.token {
        Some(token) if !token.is_empty() => token,
        _ => return Ok(()),
    };

    let presented = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(token) if token == expected => Ok(()),
        _ => Err(unauthorized()),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /chat ============

async fn handle_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Response, AppError> {
    check_auth(&state, &headers)?;

    let response = answer_chat(
        &state.pool,
        &state.config.retrieval,
        state.generator.as_ref(),
        request,
    )
    .await
    .map_err(|e| match e {
        ChatError::MissingMessage => bad_request(e.to_string()),
        ChatError::Upstream(_) => internal(e.to_string()),
    })?;

    Ok(Json(response).into_response())
}

// ============ Document endpoints ============

/// Wire shape for a document row. `content` is omitted from listings.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentBody {
    id: String,
    file_name: String,
    file_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    metadata: DocumentMeta,
    created_at: String,
}

impl DocumentBody {
    fn from_document(doc: Document, include_content: bool) -> Self {
        Self {
            id: doc.id,
            file_name: doc.file_name,
            file_type: doc.file_type,
            content: if include_content { doc.content } else { None },
            metadata: doc.metadata,
            created_at: format_ts_iso(doc.created_at),
        }
    }
}

async fn handle_list_documents(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<DocumentBody>>, AppError> {
    check_auth(&state, &headers)?;

    let docs = store::list_documents(&state.pool)
        .await
        .map_err(|e| internal(e.to_string()))?;

    Ok(Json(
        docs.into_iter()
            .map(|d| DocumentBody::from_document(d, false))
            .collect(),
    ))
}

async fn handle_get_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<DocumentBody>, AppError> {
    check_auth(&state, &headers)?;

    let doc = store::get_document(&state.pool, &id)
        .await
        .map_err(|e| internal(e.to_string()))?
        .ok_or_else(|| not_found(format!("document not found: {}", id)))?;

    Ok(Json(DocumentBody::from_document(doc, true)))
}

async fn handle_delete_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    check_auth(&state, &headers)?;

    let doc = store::get_document(&state.pool, &id)
        .await
        .map_err(|e| internal(e.to_string()))?
        .ok_or_else(|| not_found(format!("document not found: {}", id)))?;

    // Blob first, then the row; a missing blob does not block deletion.
    state
        .blobs
        .delete(&doc.file_path)
        .map_err(|e| internal(e.to_string()))?;
    store::delete_document(&state.pool, &id)
        .await
        .map_err(|e| internal(e.to_string()))?;

    Ok(StatusCode::NO_CONTENT)
}

async fn handle_process_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<DocumentMeta>, AppError> {
    check_auth(&state, &headers)?;

    let metadata = process_document(
        &state.pool,
        &state.blobs,
        state.config.chunking.max_chars,
        &id,
    )
    .await
    .map_err(|e| match e {
        ProcessError::UnsupportedFileType(_) => bad_request(e.to_string()),
        ProcessError::DocumentNotFound(_) | ProcessError::FileNotFound(_) => {
            not_found(e.to_string())
        }
        ProcessError::Persist(_) | ProcessError::Internal(_) => internal(e.to_string()),
    })?;

    Ok(Json(metadata))
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
