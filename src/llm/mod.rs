//! Language-model backend abstraction.
//!
//! [`Backend`] is the seam between the HTTP layer and a completion provider:
//! one `ask` per chat request, returning the reply text or a
//! [`ProviderError`]. `LlmProvider` is the enum over the built-in providers;
//! tests plug in their own `Backend` implementations.
//!
//! [`BackendHandle`] owns the lazily-built, shared backend instance;
//! [`ModelBackends`] keeps one more handle per nested catalog entry.

mod handle;
pub mod providers;
mod registry;

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use handle::{BackendFactory, BackendHandle, BackendState};
pub use registry::ModelBackends;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("model {0} is not configured")]
    UnknownModel(String),
    #[error("missing credentials for provider {0}")]
    MissingCredentials(String),
    #[error("provider {0} is not compiled into this binary")]
    NotCompiled(String),
    #[error("provider request failed: {0}")]
    Request(String),
}

// ── Messages ──────────────────────────────────────────────────────────────────

/// One turn of conversation context, as sent by the browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into() }
    }
}

// ── Backend ───────────────────────────────────────────────────────────────────

/// Boxed future returned by [`Backend::ask`].
pub type AskFuture<'a> = Pin<Box<dyn Future<Output = Result<String, ProviderError>> + Send + 'a>>;

/// An opaque completion capability.
///
/// Implementations are shared across requests behind an `Arc` and must be
/// safe for concurrent use.
pub trait Backend: Send + Sync {
    /// Short identifier used in logs and health output.
    fn name(&self) -> &str;

    /// Send `messages` to `model` and return the reply text.
    fn ask<'a>(&'a self, model: &'a str, messages: &'a [ChatMessage]) -> AskFuture<'a>;
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// Built-in provider backends.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    Dummy(providers::dummy::DummyProvider),
    #[cfg(feature = "provider-openai")]
    OpenAiCompatible(providers::openai_compatible::OpenAiCompatibleProvider),
}

impl Backend for LlmProvider {
    fn name(&self) -> &str {
        match self {
            LlmProvider::Dummy(_) => "dummy",
            #[cfg(feature = "provider-openai")]
            LlmProvider::OpenAiCompatible(_) => "openai-compatible",
        }
    }

    fn ask<'a>(&'a self, model: &'a str, messages: &'a [ChatMessage]) -> AskFuture<'a> {
        match self {
            LlmProvider::Dummy(p) => Box::pin(p.complete(messages)),
            #[cfg(feature = "provider-openai")]
            LlmProvider::OpenAiCompatible(p) => Box::pin(p.complete(model, messages)),
        }
    }
}
