//! Persisted panel configuration: the operator-editable TOML document.
//!
//! The document is a tree of named sections (`llm`, `web`, `system`, …).
//! Unknown sections and keys are kept as-is so older and newer panels can
//! share one file.
//!
//! # Module layout
//!
//! - **store**: [`ConfigStore`] with load, validate, masked read, merge, atomic save.
//! - **redact**: credential masking (`mask`, `is_mask_token`, `is_credential_key`).
//! - **defaults**: the built-in document used when the file is missing or broken.
//! - **llm**: typed view of the `[llm]` section used to build the backend.
//! - **models**: the model catalog derived from `[llm]`.

mod defaults;
mod llm;
mod models;
pub mod redact;
mod store;

use std::path::PathBuf;

use thiserror::Error;

pub use defaults::{default_document, DEFAULT_MAX_CONCURRENT, DEFAULT_PORT};
pub use llm::LlmConfig;
pub use models::{ModelCatalog, ModelEntry};
pub use redact::MASK_TOKEN;
pub use store::{merge, ConfigStore};

/// A configuration document: section name → section contents.
pub type Document = toml::Table;

/// Sections every loaded document carries, empty when the file omits them.
pub const CORE_SECTIONS: [&str; 3] = ["system", "llm", "web"];

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Missing, unparsable, or semantically invalid file.
    #[error("cannot read {}: {reason}", path.display())]
    Unreadable { path: PathBuf, reason: String },

    /// A document that would fail validation on the next load. Never written.
    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },

    /// Serialization or I/O failure while persisting.
    #[error("cannot write {}: {reason}", path.display())]
    WriteFailed { path: PathBuf, reason: String },
}

// ── Section helpers ───────────────────────────────────────────────────────────

/// Return section `name` of `doc`, or an empty mapping when it is absent or
/// not a mapping.
pub fn section(doc: &Document, name: &str) -> toml::Table {
    doc.get(name)
        .and_then(toml::Value::as_table)
        .cloned()
        .unwrap_or_default()
}

/// Read an integer key from a section, ignoring values of other types.
pub fn section_int(doc: &Document, section_name: &str, key: &str) -> Option<i64> {
    doc.get(section_name)
        .and_then(|s| s.get(key))
        .and_then(toml::Value::as_integer)
}

/// Read a boolean key from a section, ignoring values of other types.
pub fn section_bool(doc: &Document, section_name: &str, key: &str) -> Option<bool> {
    doc.get(section_name)
        .and_then(|s| s.get(key))
        .and_then(toml::Value::as_bool)
}
