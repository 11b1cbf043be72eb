//! Provider implementations.
//!
//! `build(config, env_api_key)` is the factory the backend handle runs on
//! first use. Adding a backend = new module + new match arm.

pub mod dummy;
#[cfg(feature = "provider-openai")]
pub mod openai_compatible;

use std::sync::Arc;

use crate::config::{ConfigStore, LlmConfig, ModelCatalog};
use crate::llm::{Backend, BackendFactory, LlmProvider, ProviderError};

/// Factory for [`BackendHandle`](crate::llm::BackendHandle): reads `[llm]`
/// from `store` at build time and falls back to `env_api_key` for the key.
pub fn factory(store: Arc<ConfigStore>, env_api_key: Option<String>) -> BackendFactory {
    Box::new(move || {
        let doc = store.load_or_default();
        let config = LlmConfig::from_document(&doc);
        let provider = build(&config, env_api_key.clone())?;
        Ok(Arc::new(provider) as Arc<dyn Backend>)
    })
}

/// Factory for the handle of nested catalog entry `id`: reads that entry's
/// `[llm.<name>]` settings from `store` at build time.
pub fn entry_factory(store: Arc<ConfigStore>, env_api_key: Option<String>, id: String) -> BackendFactory {
    Box::new(move || {
        let doc = store.load_or_default();
        let config = ModelCatalog::nested_config(&doc, &id)
            .ok_or_else(|| ProviderError::UnknownModel(id.clone()))?;
        let provider = build(&config, env_api_key.clone())?;
        Ok(Arc::new(provider) as Arc<dyn Backend>)
    })
}

/// Construct a provider from the `[llm]` section.
///
/// The key stored in the document wins; `env_api_key` (from `LLM_API_KEY`)
/// fills in when the document has none.
pub fn build(config: &LlmConfig, env_api_key: Option<String>) -> Result<LlmProvider, ProviderError> {
    match config.api_type.as_str() {
        "dummy" => Ok(LlmProvider::Dummy(dummy::DummyProvider)),
        "openai" | "openai-compatible" => build_openai(config, env_api_key),
        other => Err(ProviderError::UnknownProvider(other.to_string())),
    }
}

#[cfg(feature = "provider-openai")]
fn build_openai(config: &LlmConfig, env_api_key: Option<String>) -> Result<LlmProvider, ProviderError> {
    let api_key = config
        .api_key
        .clone()
        .or(env_api_key.filter(|k| !k.is_empty()))
        .ok_or_else(|| ProviderError::MissingCredentials(config.api_type.clone()))?;

    let p = openai_compatible::OpenAiCompatibleProvider::new(
        config.base_url.clone(),
        config.model.clone(),
        config.temperature,
        config.timeout_seconds,
        Some(api_key),
    )?;
    Ok(LlmProvider::OpenAiCompatible(p))
}

#[cfg(not(feature = "provider-openai"))]
fn build_openai(config: &LlmConfig, _env_api_key: Option<String>) -> Result<LlmProvider, ProviderError> {
    Err(ProviderError::NotCompiled(config.api_type.clone()))
}
