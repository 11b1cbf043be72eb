//! [`ConfigStore`] is the only reader and writer of the persisted TOML document.
//!
//! Writes go to a temporary file in the same directory, are synced, then
//! renamed over the target, so a concurrent reader sees either the old or
//! the new document and never a partial one. Writers are additionally
//! serialized by an in-process lock so read-merge-write cycles don't race.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;
use toml::Value;
use tracing::{debug, error, info, warn};

use super::defaults::default_document;
use super::redact::{self, is_credential_key, is_mask_token};
use super::{ConfigError, Document, CORE_SECTIONS};

pub struct ConfigStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read, parse and validate the persisted document.
    ///
    /// Core sections absent from the file come back as empty mappings.
    pub fn load(&self) -> Result<Document, ConfigError> {
        let unreadable = |reason: String| ConfigError::Unreadable {
            path: self.path.clone(),
            reason,
        };

        let raw = fs::read_to_string(&self.path).map_err(|e| unreadable(e.to_string()))?;
        let mut doc: Document =
            toml::from_str(&raw).map_err(|e| unreadable(format!("parse error: {e}")))?;

        validate(&doc).map_err(|problems| unreadable(problems.join("; ")))?;

        for name in CORE_SECTIONS {
            if !doc.contains_key(name) {
                doc.insert(name.to_string(), Value::Table(toml::Table::new()));
            }
        }
        Ok(doc)
    }

    /// [`load`](Self::load), falling back to the built-in document.
    pub fn load_or_default(&self) -> Document {
        match self.load() {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "using built-in default configuration");
                default_document()
            }
        }
    }

    /// The persisted document with every credential masked.
    pub fn read_masked(&self) -> Result<Document, ConfigError> {
        self.load().map(|doc| redact::mask(&doc))
    }

    /// Validate `doc` and persist it atomically.
    pub fn save(&self, doc: &Document) -> Result<(), ConfigError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        self.check(doc)?;
        self.write_atomic(doc)
    }

    /// Merge `incoming` into the current document and persist the result.
    ///
    /// A missing file is treated as the built-in default. A file that exists
    /// but cannot be parsed is left alone and the error is returned, so a
    /// partial write from the browser can't silently replace it. A merge
    /// result that would not load again is rejected with
    /// [`ConfigError::Invalid`] and nothing is written.
    pub fn update(&self, incoming: &Document) -> Result<Document, ConfigError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());

        let existing = if self.path.exists() {
            self.load()?
        } else {
            info!(path = %self.path.display(), "config file absent; merging into defaults");
            default_document()
        };

        let merged = merge(&existing, incoming);
        self.check(&merged)?;
        self.write_atomic(&merged)?;
        Ok(merged)
    }

    fn check(&self, doc: &Document) -> Result<(), ConfigError> {
        validate(doc).map_err(|problems| {
            let e = ConfigError::Invalid { reason: problems.join("; ") };
            warn!(path = %self.path.display(), error = %e, "config write rejected");
            e
        })
    }

    fn write_atomic(&self, doc: &Document) -> Result<(), ConfigError> {
        let failed = |reason: String| {
            let e = ConfigError::WriteFailed {
                path: self.path.clone(),
                reason,
            };
            error!(error = %e, "config write failed");
            e
        };

        let text = toml::to_string_pretty(doc).map_err(|e| failed(format!("serialize: {e}")))?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| failed(format!("create {}: {e}", dir.display())))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| failed(format!("temp file: {e}")))?;
        tmp.write_all(text.as_bytes())
            .map_err(|e| failed(format!("write: {e}")))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| failed(format!("sync: {e}")))?;
        tmp.persist(&self.path)
            .map_err(|e| failed(format!("rename: {}", e.error)))?;

        debug!(path = %self.path.display(), bytes = text.len(), "config saved atomically");
        Ok(())
    }
}

// ── Merge ─────────────────────────────────────────────────────────────────────

/// Merge `incoming` over `existing`.
///
/// - A credential key whose incoming value is the mask token keeps the
///   existing value; if there is none the token is kept verbatim.
/// - Mappings merge recursively, so sections and keys that only exist in
///   `existing` survive.
/// - Any other incoming value, including a non-mapping in place of a whole
///   section, replaces the existing one.
pub fn merge(existing: &Document, incoming: &Document) -> Document {
    let mut merged = existing.clone();
    merge_into(&mut merged, incoming);
    merged
}

fn merge_into(base: &mut toml::Table, overlay: &toml::Table) {
    for (key, incoming) in overlay {
        if is_credential_key(key) && is_mask_token(incoming) {
            if !base.contains_key(key) {
                warn!(%key, "masked credential has no stored value; keeping the mask token");
                base.insert(key.clone(), incoming.clone());
            }
            continue;
        }

        match (base.get_mut(key), incoming) {
            (Some(Value::Table(base_tbl)), Value::Table(overlay_tbl)) => {
                merge_into(base_tbl, overlay_tbl);
            }
            (Some(Value::Array(base_items)), Value::Array(overlay_items)) => {
                let mut replaced = overlay_items.clone();
                for (item, original) in replaced.iter_mut().zip(base_items.iter()) {
                    if let (Value::Table(t), Value::Table(o)) = (item, original) {
                        redact::restore_masked(t, o);
                    }
                }
                *base_items = replaced;
            }
            _ => {
                base.insert(key.clone(), incoming.clone());
            }
        }
    }
}

// ── Validation ────────────────────────────────────────────────────────────────

/// Semantic checks on top of TOML syntax. Collects every problem.
fn validate(doc: &Document) -> Result<(), Vec<String>> {
    let mut problems = Vec::new();

    for name in CORE_SECTIONS {
        if let Some(v) = doc.get(name) {
            if !v.is_table() {
                problems.push(format!("[{name}] must be a table"));
            }
        }
    }

    if let Some(port) = doc.get("web").and_then(|w| w.get("port")) {
        match port.as_integer() {
            Some(p) if (1..=65535).contains(&p) => {}
            _ => problems.push(format!("web.port must be an integer in 1..=65535, got {port}")),
        }
    }

    if let Some(cap) = doc
        .get("system")
        .and_then(|s| s.get("max_concurrent_requests"))
    {
        match cap.as_integer() {
            Some(n) if n > 0 => {}
            _ => problems.push(format!(
                "system.max_concurrent_requests must be a positive integer, got {cap}"
            )),
        }
    }

    if problems.is_empty() { Ok(()) } else { Err(problems) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MASK_TOKEN;
    use tempfile::TempDir;

    fn doc(src: &str) -> Document {
        toml::from_str(src).unwrap()
    }

    fn store_in(dir: &TempDir) -> ConfigStore {
        ConfigStore::new(dir.path().join("config").join("config.toml"))
    }

    // ── load ──────────────────────────────────────────────────────────────

    #[test]
    fn missing_file_is_unreadable() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(matches!(store.load(), Err(ConfigError::Unreadable { .. })));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let doc = store_in(&dir).load_or_default();
        for name in CORE_SECTIONS {
            assert!(doc[name].is_table(), "missing [{name}]");
        }
    }

    #[test]
    fn malformed_file_is_unreadable() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "[llm\nmodel = ").unwrap();
        let err = store.load().unwrap_err();
        assert!(err.to_string().contains("parse error"));
    }

    #[test]
    fn invalid_values_are_reported_together() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(
            store.path(),
            "llm = 3\n[web]\nport = 70000\n[system]\nmax_concurrent_requests = 0\n",
        )
        .unwrap();
        let msg = store.load().unwrap_err().to_string();
        assert!(msg.contains("[llm] must be a table"));
        assert!(msg.contains("web.port"));
        assert!(msg.contains("max_concurrent_requests"));
    }

    #[test]
    fn load_fills_absent_core_sections() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.save(&doc("[custom]\nflag = true\n")).unwrap();
        let loaded = store.load().unwrap();
        assert!(loaded["web"].as_table().unwrap().is_empty());
        assert_eq!(loaded["custom"]["flag"].as_bool(), Some(true));
    }

    // ── save ──────────────────────────────────────────────────────────────

    #[test]
    fn save_then_load_preserves_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let original = doc(
            "[system]\nmax_concurrent_requests = 3\n[llm]\nmodel = \"m\"\nfuture_knob = [1, 2]\n[web]\nport = 8000\n[extra.deep]\nx = \"y\"\n",
        );
        store.save(&original).unwrap();
        assert_eq!(store.load().unwrap(), original);
    }

    #[test]
    fn save_leaves_no_temp_files_behind() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.save(&default_document()).unwrap();
        store.save(&default_document()).unwrap();
        let entries: Vec<_> = fs::read_dir(store.path().parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("config.toml")]);
    }

    #[test]
    fn save_into_unwritable_location_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "file").unwrap();
        let store = ConfigStore::new(blocker.join("config.toml"));
        let err = store.save(&default_document()).unwrap_err();
        assert!(matches!(err, ConfigError::WriteFailed { .. }));
    }

    // ── read_masked ───────────────────────────────────────────────────────

    #[test]
    fn read_masked_hides_keys_and_does_not_touch_disk() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.save(&doc("[llm]\napi_key = \"sk-live\"\n")).unwrap();
        let masked = store.read_masked().unwrap();
        assert_eq!(masked["llm"]["api_key"].as_str(), Some(MASK_TOKEN));
        let on_disk = fs::read_to_string(store.path()).unwrap();
        assert!(on_disk.contains("sk-live"));
    }

    // ── merge ─────────────────────────────────────────────────────────────

    #[test]
    fn merge_keeps_secret_behind_mask() {
        let existing = doc("[llm.model_a]\napi_key = \"sk-real\"\nmodel = \"a\"\n");
        let incoming = doc("[llm.model_a]\napi_key = \"********\"\nmodel = \"a2\"\n");
        let merged = merge(&existing, &incoming);
        assert_eq!(merged["llm"]["model_a"]["api_key"].as_str(), Some("sk-real"));
        assert_eq!(merged["llm"]["model_a"]["model"].as_str(), Some("a2"));
    }

    #[test]
    fn merge_without_stored_secret_keeps_token_verbatim() {
        let existing = doc("[llm]\nmodel = \"a\"\n");
        let incoming = doc("[llm.model_b]\napi_key = \"********\"\n");
        let merged = merge(&existing, &incoming);
        assert_eq!(merged["llm"]["model_b"]["api_key"].as_str(), Some(MASK_TOKEN));
    }

    #[test]
    fn merge_overwrites_plain_secret() {
        let existing = doc("[llm]\napi_key = \"old\"\n");
        let incoming = doc("[llm]\napi_key = \"new\"\n");
        assert_eq!(merge(&existing, &incoming)["llm"]["api_key"].as_str(), Some("new"));
    }

    #[test]
    fn merge_preserves_untouched_sections() {
        let existing = doc("[web]\nport = 5000\n[system]\nmax_concurrent_requests = 2\n");
        let incoming = doc("[web]\ndebug = true\n");
        let merged = merge(&existing, &incoming);
        assert_eq!(merged["web"]["port"].as_integer(), Some(5000));
        assert_eq!(merged["web"]["debug"].as_bool(), Some(true));
        assert_eq!(merged["system"]["max_concurrent_requests"].as_integer(), Some(2));
    }

    #[test]
    fn merge_non_table_replaces_whole_section() {
        let existing = doc("[web]\nport = 5000\n");
        let mut incoming = Document::new();
        incoming.insert("web".into(), Value::String("disabled".into()));
        assert_eq!(merge(&existing, &incoming)["web"].as_str(), Some("disabled"));
    }

    #[test]
    fn merge_restores_secrets_inside_replaced_arrays() {
        let existing = doc("[[providers]]\nname = \"a\"\napi_key = \"k1\"\n");
        let incoming = doc(
            "[[providers]]\nname = \"a\"\napi_key = \"********\"\n[[providers]]\nname = \"b\"\napi_key = \"k2\"\n",
        );
        let merged = merge(&existing, &incoming);
        let providers = merged["providers"].as_array().unwrap();
        assert_eq!(providers.len(), 2);
        assert_eq!(providers[0]["api_key"].as_str(), Some("k1"));
        assert_eq!(providers[1]["api_key"].as_str(), Some("k2"));
    }

    #[test]
    fn merge_of_masked_read_is_identity() {
        let existing = doc("[llm]\napi_key = \"sk\"\nmodel = \"m\"\n[llm.v]\napi_key = \"sk2\"\n");
        let merged = merge(&existing, &redact::mask(&existing));
        assert_eq!(merged, existing);
    }

    // ── update ────────────────────────────────────────────────────────────

    #[test]
    fn update_persists_merge_with_real_key() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store
            .save(&doc("[llm.model_a]\napi_key = \"sk-real\"\n[web]\nport = 5000\n"))
            .unwrap();

        let incoming = doc("[llm.model_a]\napi_key = \"********\"\n");
        store.update(&incoming).unwrap();

        let on_disk = store.load().unwrap();
        assert_eq!(on_disk["llm"]["model_a"]["api_key"].as_str(), Some("sk-real"));
        assert_eq!(on_disk["web"]["port"].as_integer(), Some(5000));
    }

    #[test]
    fn update_without_file_starts_from_defaults() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.update(&doc("[web]\nport = 6000\n")).unwrap();
        let on_disk = store.load().unwrap();
        assert_eq!(on_disk["web"]["port"].as_integer(), Some(6000));
        assert_eq!(on_disk["llm"]["model"].as_str(), Some("gpt-4o"));
    }

    #[test]
    fn update_refuses_to_clobber_malformed_file() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "not = [valid").unwrap();
        assert!(store.update(&doc("[web]\nport = 6000\n")).is_err());
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "not = [valid");
    }

    #[test]
    fn update_rejects_merge_that_would_not_load() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.save(&doc("[web]\nport = 5000\n[llm]\napi_type = \"dummy\"\n")).unwrap();
        let before = fs::read_to_string(store.path()).unwrap();

        for bad in [
            "[web]\nport = 70000\n",
            "[system]\nmax_concurrent_requests = 0\n",
            "web = \"x\"\n",
        ] {
            let err = store.update(&doc(bad)).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { .. }), "{bad}: {err}");
            assert_eq!(fs::read_to_string(store.path()).unwrap(), before);
        }

        // Still writable after the rejections.
        store.update(&doc("[web]\nport = 5001\n")).unwrap();
        assert_eq!(store.load().unwrap()["web"]["port"].as_integer(), Some(5001));
    }

    #[test]
    fn save_rejects_invalid_document() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let err = store.save(&doc("[web]\nport = 0\n")).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
        assert!(!store.path().exists());
    }

    #[test]
    fn concurrent_updates_do_not_lose_writes() {
        let dir = TempDir::new().unwrap();
        let store = std::sync::Arc::new(store_in(&dir));
        store.save(&default_document()).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let incoming = doc(&format!("[extra]\nkey_{i} = {i}\n"));
                    store.update(&incoming).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let on_disk = store.load().unwrap();
        let extra = on_disk["extra"].as_table().unwrap();
        assert_eq!(extra.len(), 8);
    }
}
