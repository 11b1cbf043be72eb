//! Dummy provider: echoes the last user message prefixed with `[echo]`.
//! Lets the panel run end to end without an API key.

use crate::llm::{ChatMessage, ProviderError};

#[derive(Debug, Clone)]
pub struct DummyProvider;

impl DummyProvider {
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let last = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        Ok(format!("[echo] {last}"))
    }
}
