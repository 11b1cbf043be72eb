//! Built-in configuration document.
//!
//! Used whenever the persisted file is missing or unreadable, so the panel
//! always starts with the `system`, `llm` and `web` sections present.

use toml::Value;

use super::Document;

pub const DEFAULT_MAX_CONCURRENT: usize = 2;
pub const DEFAULT_PORT: u16 = 5000;

const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Hard-coded minimal document.
pub fn default_document() -> Document {
    let mut system = toml::Table::new();
    system.insert(
        "max_concurrent_requests".into(),
        Value::Integer(DEFAULT_MAX_CONCURRENT as i64),
    );

    let mut llm = toml::Table::new();
    llm.insert("api_type".into(), Value::String("openai".into()));
    llm.insert("model".into(), Value::String(DEFAULT_MODEL.into()));
    llm.insert("base_url".into(), Value::String(DEFAULT_BASE_URL.into()));
    llm.insert("api_key".into(), Value::String(String::new()));
    llm.insert("temperature".into(), Value::Float(0.7));
    llm.insert("max_tokens".into(), Value::Integer(4096));
    llm.insert("timeout_seconds".into(), Value::Integer(120));

    let mut web = toml::Table::new();
    web.insert("port".into(), Value::Integer(i64::from(DEFAULT_PORT)));
    web.insert("debug".into(), Value::Boolean(false));

    let mut doc = Document::new();
    doc.insert("system".into(), Value::Table(system));
    doc.insert("llm".into(), Value::Table(llm));
    doc.insert("web".into(), Value::Table(web));
    doc
}
