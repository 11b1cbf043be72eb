//! Handlers for `/api/*` routes.
//!
//! Each handler receives [`AppState`] via [`State`] and returns an axum
//! [`Response`]. Blocking file I/O (config reads and writes, backend
//! construction) runs on the blocking pool.

use std::time::Duration;

use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::bridge::{self, BridgeError};
use crate::config::{self, ConfigError, Document, LlmConfig, ModelCatalog, redact};
use crate::llm::{BackendState, ChatMessage};
use crate::preferences::{Preferences, PreferencesPatch};
use crate::stats::SystemStats;
use crate::uploads::{self, StoredUpload, UploadError};

use super::AppState;

/// Seconds a rejected chat client is asked to wait before retrying.
const RETRY_AFTER_SECS: &str = "1";

// ── Request types ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct ChatRequest {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    context: Vec<ChatMessage>,
    #[serde(default)]
    model: Option<String>,
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn json_error(msg: impl std::fmt::Display) -> Json<serde_json::Value> {
    Json(json!({ "error": msg.to_string() }))
}

fn chat_reply(code: StatusCode, status: &str, model: &str, response: impl Into<String>) -> Response {
    (
        code,
        Json(json!({ "response": response.into(), "status": status, "model": model })),
    )
        .into_response()
}

fn config_failure(code: StatusCode, msg: impl std::fmt::Display) -> Response {
    (code, Json(json!({ "success": false, "error": msg.to_string() }))).into_response()
}

async fn load_document(state: &AppState) -> Document {
    let store = state.store.clone();
    match tokio::task::spawn_blocking(move || store.load_or_default()).await {
        Ok(doc) => doc,
        Err(e) => {
            error!(error = %e, "config load task failed");
            config::default_document()
        }
    }
}

// ── Chat ──────────────────────────────────────────────────────────────────────

/// POST /api/chat
pub(super) async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let req = match body {
        Ok(Json(req)) => req,
        Err(e) => return (StatusCode::BAD_REQUEST, json_error(e.body_text())).into_response(),
    };
    let Some(message) = req.message.filter(|m| !m.trim().is_empty()) else {
        return (StatusCode::BAD_REQUEST, json_error("No message provided")).into_response();
    };

    let ticket = match state.governor.try_enter() {
        Ok(ticket) => ticket,
        Err(rejected) => {
            let model = req.model.unwrap_or_default();
            return (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, RETRY_AFTER_SECS)],
                Json(json!({
                    "response": format!("The server is busy ({rejected}); please retry shortly."),
                    "status": "warning",
                    "model": model,
                })),
            )
                .into_response();
        }
    };

    let doc = load_document(&state).await;
    let llm = LlmConfig::from_document(&doc);
    let model = req
        .model
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| ModelCatalog::from_document(&doc).default_model_id().to_string());

    // Nested catalog entries run on their own backend and deadline.
    let entry = ModelCatalog::nested_config(&doc, &model);
    let timeout_seconds = entry.as_ref().map_or(llm.timeout_seconds, |c| c.timeout_seconds);
    let handle = match entry {
        Some(_) => state.model_backends.handle(&model),
        None => state.backend.clone(),
    };
    let backend = match tokio::task::spawn_blocking(move || handle.get()).await {
        Ok(BackendState::Ready(backend)) => backend,
        Ok(BackendState::Unavailable(reason)) => {
            return chat_reply(
                StatusCode::OK,
                "warning",
                &model,
                format!("The model backend is unavailable: {reason}"),
            );
        }
        Err(e) => {
            error!(error = %e, "backend construction task failed");
            return chat_reply(StatusCode::INTERNAL_SERVER_ERROR, "error", &model, e.to_string());
        }
    };

    let mut messages = req.context;
    messages.push(ChatMessage::user(message));

    let deadline = Duration::from_secs(timeout_seconds);
    let call_model = model.clone();
    let outcome = tokio::time::timeout(
        deadline,
        bridge::invoke(async move { backend.ask(&call_model, &messages).await }),
    )
    .await;
    drop(ticket);

    match outcome {
        Ok(Ok(text)) => chat_reply(StatusCode::OK, "success", &model, text),
        Ok(Err(e)) => {
            let detail = match &e {
                BridgeError::Backend(msg) => msg.clone(),
                other => other.to_string(),
            };
            warn!(%model, error = %e, "chat backend call failed");
            chat_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                "error",
                &model,
                format!("Sorry, I encountered an error: {detail}"),
            )
        }
        Err(_) => {
            warn!(%model, timeout_secs = timeout_seconds, "chat backend call timed out");
            chat_reply(
                StatusCode::GATEWAY_TIMEOUT,
                "error",
                &model,
                format!("The model did not answer within {timeout_seconds} s"),
            )
        }
    }
}

// ── Configuration ─────────────────────────────────────────────────────────────

/// GET /api/config: the persisted document with every credential masked.
pub(super) async fn get_config(State(state): State<AppState>) -> Response {
    let store = state.store.clone();
    let path = store.path().display().to_string();

    match tokio::task::spawn_blocking(move || store.read_masked()).await {
        Ok(Ok(doc)) => (StatusCode::OK, Json(json!({ "config": doc, "path": path }))).into_response(),
        Ok(Err(e)) => {
            warn!(error = %e, "serving default configuration");
            let doc = redact::mask(&config::default_document());
            (
                StatusCode::OK,
                Json(json!({ "config": doc, "path": path, "error": e.to_string() })),
            )
                .into_response()
        }
        Err(e) => config_failure(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

/// POST|PUT /api/config: merge the body into the stored document and save.
pub(super) async fn update_config(
    State(state): State<AppState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Response {
    let value = match body {
        Ok(Json(value)) => value,
        Err(e) => return config_failure(StatusCode::BAD_REQUEST, e.body_text()),
    };
    if !value.is_object() {
        return config_failure(StatusCode::BAD_REQUEST, "configuration must be a JSON object");
    }
    let incoming: Document = match serde_json::from_value(value) {
        Ok(doc) => doc,
        Err(e) => {
            return config_failure(StatusCode::BAD_REQUEST, format!("not representable as TOML: {e}"));
        }
    };

    let store = state.store.clone();
    match tokio::task::spawn_blocking(move || store.update(&incoming)).await {
        Ok(Ok(_)) => {
            // The next chat builds its backend from the new document.
            state.reset_backends();
            info!(path = %state.store.path().display(), "configuration updated");
            (StatusCode::OK, Json(json!({ "success": true }))).into_response()
        }
        Ok(Err(e @ ConfigError::Invalid { .. })) => config_failure(StatusCode::BAD_REQUEST, e),
        Ok(Err(e)) => config_failure(StatusCode::INTERNAL_SERVER_ERROR, e),
        Err(e) => config_failure(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

// ── Catalog ───────────────────────────────────────────────────────────────────

/// GET /api/models
pub(super) async fn models(State(state): State<AppState>) -> Response {
    let doc = load_document(&state).await;
    let catalog = ModelCatalog::from_document(&doc);
    (StatusCode::OK, Json(json!({ "models": catalog.entries() }))).into_response()
}

/// GET /api/tools
pub(super) async fn tools() -> Response {
    let tools = json!([
        { "id": "web_search", "name": "Web Search", "icon": "fa-globe",
          "description": "Search the web for information" },
        { "id": "file_upload", "name": "File Upload", "icon": "fa-file-upload",
          "description": "Upload and analyze files" },
        { "id": "code_run", "name": "Code Execution", "icon": "fa-code",
          "description": "Execute code in various languages" },
        { "id": "browser", "name": "Web Browser", "icon": "fa-window-maximize",
          "description": "Navigate and interact with websites" },
        { "id": "terminal", "name": "Terminal", "icon": "fa-terminal",
          "description": "Run system commands" },
    ]);
    (StatusCode::OK, Json(json!({ "tools": tools }))).into_response()
}

// ── Preferences ───────────────────────────────────────────────────────────────

/// GET /api/settings
pub(super) async fn get_preferences(State(state): State<AppState>) -> Response {
    let prefs: Preferences = state
        .preferences
        .lock()
        .unwrap_or_else(|p| p.into_inner())
        .clone();
    (StatusCode::OK, Json(prefs)).into_response()
}

/// PUT /api/settings
pub(super) async fn update_preferences(
    State(state): State<AppState>,
    body: Result<Json<PreferencesPatch>, JsonRejection>,
) -> Response {
    let patch = match body {
        Ok(Json(patch)) => patch,
        Err(e) => return (StatusCode::BAD_REQUEST, json_error(e.body_text())).into_response(),
    };
    let updated = {
        let mut prefs = state.preferences.lock().unwrap_or_else(|p| p.into_inner());
        prefs.apply(patch);
        prefs.clone()
    };
    (StatusCode::OK, Json(json!({ "success": true, "settings": updated }))).into_response()
}

// ── Operations ────────────────────────────────────────────────────────────────

/// GET /api/system/stats
pub(super) async fn system_stats(State(state): State<AppState>) -> Response {
    let stats = SystemStats::collect(state.started, &state.governor, &state.backend);
    (StatusCode::OK, Json(stats)).into_response()
}

/// GET /api/health
pub(super) async fn health(State(state): State<AppState>) -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "backend": state.backend.status(),
            "model_backends": state.model_backends.count(),
            "in_flight": state.governor.in_flight(),
            "max_concurrent": state.governor.max_concurrent(),
        })),
    )
        .into_response()
}

/// POST /api/backend/reset
pub(super) async fn backend_reset(State(state): State<AppState>) -> Response {
    state.reset_backends();
    (
        StatusCode::OK,
        Json(json!({ "success": true, "backend": state.backend.status() })),
    )
        .into_response()
}

// ── Uploads ───────────────────────────────────────────────────────────────────

/// POST /api/upload
pub(super) async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    match receive_upload(&state, multipart).await {
        Ok(stored) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "filename": stored.filename,
                "size": stored.size,
                "file_id": stored.file_id,
            })),
        )
            .into_response(),
        Err(e) if e.is_client_error() => (StatusCode::BAD_REQUEST, json_error(e)).into_response(),
        Err(e) => {
            error!(error = %e, "upload failed");
            (StatusCode::INTERNAL_SERVER_ERROR, json_error(e)).into_response()
        }
    }
}

async fn receive_upload(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<StoredUpload, UploadError> {
    let mut multipart = multipart.map_err(|_| UploadError::NoFilePart)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::Malformed(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        if name.is_empty() {
            return Err(UploadError::NoSelectedFile);
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| UploadError::Malformed(e.to_string()))?;
        return uploads::store(&state.upload_dir, &name, &bytes).await;
    }

    Err(UploadError::NoFilePart)
}
