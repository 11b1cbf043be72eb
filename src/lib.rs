//! Manus panel: a browser control panel in front of a language-model backend.
//!
//! Request path for chat: [`governor`] admits or rejects, [`config`] supplies
//! the model identity, [`llm::BackendHandle`] supplies the client, and
//! [`bridge`] runs the call in its own task. Configuration routes skip the
//! governor and go through [`config::ConfigStore`] with credential masking.

pub mod bridge;
pub mod config;
pub mod error;
pub mod governor;
pub mod http;
pub mod llm;
pub mod logger;
pub mod preferences;
pub mod settings;
pub mod stats;
pub mod uploads;

use std::sync::Arc;

use crate::config::ConfigStore;
use crate::governor::AdmissionGovernor;
use crate::http::AppState;
use crate::llm::{BackendHandle, providers};
use crate::settings::Settings;

/// Wire the shared components described by `settings` into router state.
pub fn build_state(settings: &Settings) -> AppState {
    let store = Arc::new(ConfigStore::new(&settings.config_path));
    let backend = Arc::new(BackendHandle::new(providers::factory(
        store.clone(),
        settings.llm_api_key.clone(),
    )));
    let governor = Arc::new(AdmissionGovernor::new(settings.max_concurrent));
    AppState::new(store, backend, governor, settings.upload_dir.clone())
        .with_llm_api_key(settings.llm_api_key.clone())
}
