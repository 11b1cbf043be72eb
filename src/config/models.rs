//! Model catalog derived from the `[llm]` section.
//!
//! The top-level keys of `[llm]` describe the default model. Each nested
//! table `[llm.<name>]` adds one more entry and inherits whatever it leaves
//! out from the top level. With no `[llm]` keys at all the built-in catalog
//! is served instead.

use serde::Serialize;
use toml::Value;

use super::llm::LlmConfig;
use super::Document;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelEntry {
    pub id: String,
    #[serde(rename = "name")]
    pub display_name: String,
    pub base_url: String,
    pub api_type: String,
    #[serde(rename = "features")]
    pub capability_tags: Vec<String>,
}

/// `(id, display name, features)` for the catalog served without config.
type BuiltinModel = (&'static str, &'static str, &'static [&'static str]);

static BUILTIN: [BuiltinModel; 4] = [
    ("gpt-4o", "GPT-4o", &["web_access", "file_upload", "code_execution", "tool_use"]),
    (
        "claude-3-opus",
        "Claude 3 Opus",
        &["web_access", "file_upload", "code_execution", "tool_use"],
    ),
    ("claude-3-sonnet", "Claude 3 Sonnet", &["web_access", "file_upload", "code_execution"]),
    ("llama-3", "Llama 3", &["file_upload", "code_execution"]),
];

#[derive(Debug, Clone, PartialEq)]
pub struct ModelCatalog {
    entries: Vec<ModelEntry>,
}

impl ModelCatalog {
    pub fn from_document(doc: &Document) -> Self {
        let Some(llm) = doc.get("llm").and_then(Value::as_table).filter(|t| !t.is_empty()) else {
            return Self::builtin();
        };

        let top = LlmConfig::from_document(doc);
        let mut entries = Vec::new();

        // Only a section with its own scalar keys defines a default entry.
        if llm.values().any(|v| !v.is_table()) {
            entries.push(entry(&top.model, llm, &top));
        }

        // toml::Table is ordered by key, so nested entries come out by name.
        for (name, value) in llm {
            let Value::Table(nested) = value else { continue };
            let cfg = LlmConfig::from_table(nested, &top);
            let id = nested
                .get("model")
                .and_then(Value::as_str)
                .unwrap_or(name.as_str());
            entries.push(entry(id, nested, &cfg));
        }

        let mut seen = std::collections::HashSet::new();
        entries.retain(|e| seen.insert(e.id.clone()));

        if entries.is_empty() {
            return Self::builtin();
        }
        Self { entries }
    }

    /// Backend settings for `id` when it names a nested `[llm.<name>]` entry,
    /// with `model` set to `id`. `None` for the default entry, built-in
    /// entries and unknown ids; those run on the top-level backend.
    pub fn nested_config(doc: &Document, id: &str) -> Option<LlmConfig> {
        let llm = doc.get("llm").and_then(Value::as_table)?;
        let top = LlmConfig::from_document(doc);

        // The default entry wins a duplicate id.
        if llm.values().any(|v| !v.is_table()) && top.model == id {
            return None;
        }

        llm.iter().find_map(|(name, value)| {
            let nested = value.as_table()?;
            let entry_id = nested.get("model").and_then(Value::as_str).unwrap_or(name.as_str());
            if entry_id != id {
                return None;
            }
            let mut cfg = LlmConfig::from_table(nested, &top);
            cfg.model = id.to_string();
            Some(cfg)
        })
    }

    pub fn builtin() -> Self {
        let top = LlmConfig::default();
        let entries = BUILTIN
            .iter()
            .map(|(id, name, tags)| ModelEntry {
                id: (*id).into(),
                display_name: (*name).into(),
                base_url: top.base_url.clone(),
                api_type: top.api_type.clone(),
                capability_tags: tags.iter().map(|t| (*t).into()).collect(),
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[ModelEntry] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&ModelEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Id of the first entry; the catalog is never empty.
    pub fn default_model_id(&self) -> &str {
        self.entries.first().map(|e| e.id.as_str()).unwrap_or("gpt-4o")
    }
}

fn entry(id: &str, table: &toml::Table, cfg: &LlmConfig) -> ModelEntry {
    let display_name = table
        .get("display_name")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .or_else(|| builtin_field(id).map(|(_, name, _)| name.to_string()))
        .unwrap_or_else(|| id.to_string());

    let capability_tags = match table.get("features").and_then(Value::as_array) {
        Some(items) => items.iter().filter_map(Value::as_str).map(str::to_owned).collect(),
        None => builtin_field(id)
            .map(|(_, _, tags)| tags.iter().map(|t| (*t).to_string()).collect())
            .unwrap_or_default(),
    };

    ModelEntry {
        id: id.to_string(),
        display_name,
        base_url: cfg.base_url.clone(),
        api_type: cfg.api_type.clone(),
        capability_tags,
    }
}

fn builtin_field(id: &str) -> Option<&'static BuiltinModel> {
    BUILTIN.iter().find(|(b, _, _)| *b == id)
}
