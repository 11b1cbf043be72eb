//! Typed view of the `[llm]` section.

use toml::Value;

use super::redact::MASK_TOKEN;
use super::Document;

const DEFAULT_API_TYPE: &str = "openai";
const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Backend settings read from the top level of `[llm]`.
///
/// Every field falls back to a built-in default when absent or of the wrong
/// type. `api_key` is `None` when unset, empty, or still the mask token.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub api_type: String,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_type: DEFAULT_API_TYPE.into(),
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: None,
            temperature: DEFAULT_TEMPERATURE,
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl LlmConfig {
    pub fn from_document(doc: &Document) -> Self {
        match doc.get("llm").and_then(Value::as_table) {
            Some(table) => Self::from_table(table, &Self::default()),
            None => Self::default(),
        }
    }

    /// Read `table`, taking anything it lacks from `parent`.
    pub(crate) fn from_table(table: &toml::Table, parent: &Self) -> Self {
        let string = |key: &str| table.get(key).and_then(Value::as_str).map(str::to_owned);

        let api_key = match table.get("api_key") {
            Some(Value::String(k)) if k.is_empty() || k == MASK_TOKEN => None,
            Some(Value::String(k)) => Some(k.clone()),
            _ => parent.api_key.clone(),
        };

        let temperature = match table.get("temperature") {
            Some(Value::Float(f)) => *f as f32,
            Some(Value::Integer(i)) => *i as f32,
            _ => parent.temperature,
        };

        let timeout_seconds = table
            .get("timeout_seconds")
            .and_then(Value::as_integer)
            .filter(|t| *t > 0)
            .map(|t| t as u64)
            .unwrap_or(parent.timeout_seconds);

        Self {
            api_type: string("api_type").unwrap_or_else(|| parent.api_type.clone()),
            model: string("model").unwrap_or_else(|| parent.model.clone()),
            base_url: string("base_url").unwrap_or_else(|| parent.base_url.clone()),
            api_key,
            temperature,
            timeout_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(src: &str) -> Document {
        toml::from_str(src).unwrap()
    }

    #[test]
    fn absent_section_gives_defaults() {
        assert_eq!(LlmConfig::from_document(&Document::new()), LlmConfig::default());
    }

    #[test]
    fn reads_top_level_keys() {
        let cfg = LlmConfig::from_document(&doc(
            "[llm]\napi_type = \"dummy\"\nmodel = \"m\"\nbase_url = \"http://x\"\napi_key = \"k\"\ntemperature = 1\ntimeout_seconds = 5\n",
        ));
        assert_eq!(cfg.api_type, "dummy");
        assert_eq!(cfg.model, "m");
        assert_eq!(cfg.base_url, "http://x");
        assert_eq!(cfg.api_key.as_deref(), Some("k"));
        assert_eq!(cfg.temperature, 1.0);
        assert_eq!(cfg.timeout_seconds, 5);
    }

    #[test]
    fn empty_or_masked_key_is_none() {
        for src in ["[llm]\napi_key = \"\"\n", "[llm]\napi_key = \"********\"\n"] {
            assert_eq!(LlmConfig::from_document(&doc(src)).api_key, None);
        }
    }

    #[test]
    fn wrong_types_fall_back() {
        let cfg = LlmConfig::from_document(&doc("[llm]\nmodel = 3\ntimeout_seconds = -1\n"));
        assert_eq!(cfg.model, "gpt-4o");
        assert_eq!(cfg.timeout_seconds, 120);
    }

    #[test]
    fn nested_table_inherits_from_parent() {
        let d = doc("[llm]\nmodel = \"base\"\napi_key = \"k\"\n[llm.vision]\nmodel = \"v\"\n");
        let parent = LlmConfig::from_document(&d);
        let nested = d["llm"]["vision"].as_table().unwrap();
        let cfg = LlmConfig::from_table(nested, &parent);
        assert_eq!(cfg.model, "v");
        assert_eq!(cfg.api_key.as_deref(), Some("k"));
    }
}
