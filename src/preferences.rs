//! In-memory user preferences served by `/api/settings`.
//!
//! Not persisted; a restart brings back the defaults.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preferences {
    pub theme: String,
    pub default_model: String,
    pub temperature: f64,
    pub save_conversations: bool,
    pub allow_web_searches: bool,
    pub data_retention_days: u32,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: "dark".into(),
            default_model: "gpt-4o".into(),
            temperature: 0.7,
            save_conversations: true,
            allow_web_searches: true,
            data_retention_days: 30,
        }
    }
}

/// Partial update; absent fields keep their current value, unknown fields
/// are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct PreferencesPatch {
    pub theme: Option<String>,
    pub default_model: Option<String>,
    pub temperature: Option<f64>,
    pub save_conversations: Option<bool>,
    pub allow_web_searches: Option<bool>,
    pub data_retention_days: Option<u32>,
}

impl Preferences {
    pub fn apply(&mut self, patch: PreferencesPatch) {
        if let Some(v) = patch.theme {
            self.theme = v;
        }
        if let Some(v) = patch.default_model {
            self.default_model = v;
        }
        if let Some(v) = patch.temperature {
            self.temperature = v;
        }
        if let Some(v) = patch.save_conversations {
            self.save_conversations = v;
        }
        if let Some(v) = patch.allow_web_searches {
            self.allow_web_searches = v;
        }
        if let Some(v) = patch.data_retention_days {
            self.data_retention_days = v;
        }
    }
}
