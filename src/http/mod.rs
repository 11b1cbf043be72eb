//! HTTP surface: JSON API under `/api/` plus the built-in dashboard page.
//!
//! ## URL layout
//!
//! ```text
//! POST     /api/chat            admission-governed model call
//! GET      /api/config          masked configuration document
//! POST|PUT /api/config          merge + persist
//! GET      /api/models
//! GET      /api/tools
//! GET|PUT  /api/settings        in-memory user preferences
//! GET      /api/system/stats
//! POST     /api/upload          multipart field `file`
//! GET      /api/health
//! POST     /api/backend/reset
//! GET      /favicon.ico         → 204
//! GET      /                    → dashboard
//! ```
//!
//! Only `/api/chat` passes through the admission governor.

mod api;
mod ui;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::{
    Router,
    http::StatusCode,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ConfigStore;
use crate::error::AppError;
use crate::governor::AdmissionGovernor;
use crate::llm::{BackendHandle, ModelBackends};
use crate::preferences::Preferences;

// ── Shared request state ──────────────────────────────────────────────────────

/// Router state injected into every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ConfigStore>,
    pub backend: Arc<BackendHandle>,
    /// Backends for nested `[llm.<name>]` catalog entries.
    pub model_backends: Arc<ModelBackends>,
    pub governor: Arc<AdmissionGovernor>,
    pub preferences: Arc<Mutex<Preferences>>,
    pub upload_dir: Arc<PathBuf>,
    pub started: Instant,
}

impl AppState {
    pub fn new(
        store: Arc<ConfigStore>,
        backend: Arc<BackendHandle>,
        governor: Arc<AdmissionGovernor>,
        upload_dir: PathBuf,
    ) -> Self {
        Self {
            model_backends: Arc::new(ModelBackends::new(store.clone(), None)),
            store,
            backend,
            governor,
            preferences: Arc::new(Mutex::new(Preferences::default())),
            upload_dir: Arc::new(upload_dir),
            started: Instant::now(),
        }
    }

    /// Key used by per-model backends whose table and parent carry none.
    pub fn with_llm_api_key(mut self, env_api_key: Option<String>) -> Self {
        self.model_backends = Arc::new(ModelBackends::new(self.store.clone(), env_api_key));
        self
    }

    /// Drop every cached backend outcome.
    pub fn reset_backends(&self) {
        self.backend.reset();
        self.model_backends.reset();
    }
}

// ── Server loop ───────────────────────────────────────────────────────────────

/// Bind `bind_addr` and serve until `shutdown` is cancelled.
pub async fn serve(bind_addr: &str, state: AppState, shutdown: CancellationToken) -> Result<(), AppError> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| AppError::Server(format!("bind failed on {bind_addr}: {e}")))?;

    info!(
        %bind_addr,
        max_concurrent = state.governor.max_concurrent(),
        config = %state.store.path().display(),
        "panel listening"
    );

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AppError::Server(format!("server error: {e}")))?;

    info!("panel shut down");
    Ok(())
}

// ── Router ────────────────────────────────────────────────────────────────────

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat",           post(api::chat))
        .route("/api/config",         get(api::get_config).post(api::update_config).put(api::update_config))
        .route("/api/models",         get(api::models))
        .route("/api/tools",          get(api::tools))
        .route("/api/settings",       get(api::get_preferences).put(api::update_preferences))
        .route("/api/system/stats",   get(api::system_stats))
        .route("/api/upload",         post(api::upload))
        .route("/api/health",         get(api::health))
        .route("/api/backend/reset",  post(api::backend_reset))
        .route("/favicon.ico", get(|| async { StatusCode::NO_CONTENT }))
        .route("/",            get(ui::root))
        .with_state(state)
}
