//! [`ModelBackends`]: one [`BackendHandle`] per nested `[llm.<name>]` entry.
//!
//! A handle is created the first time a chat names that entry and follows
//! the same lifecycle as the top-level handle. [`ModelBackends::reset`]
//! drops them all, so the next request rebuilds from the current document.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use super::{BackendHandle, providers};
use crate::config::ConfigStore;

pub struct ModelBackends {
    store: Arc<ConfigStore>,
    env_api_key: Option<String>,
    handles: Mutex<HashMap<String, Arc<BackendHandle>>>,
}

impl ModelBackends {
    pub fn new(store: Arc<ConfigStore>, env_api_key: Option<String>) -> Self {
        Self {
            store,
            env_api_key,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Handle for catalog entry `id`, created on first use. Never runs the
    /// factory itself.
    pub fn handle(&self, id: &str) -> Arc<BackendHandle> {
        let mut handles = self.lock();
        handles
            .entry(id.to_string())
            .or_insert_with(|| {
                debug!(model = %id, "creating per-model backend handle");
                Arc::new(BackendHandle::new(providers::entry_factory(
                    self.store.clone(),
                    self.env_api_key.clone(),
                    id.to_string(),
                )))
            })
            .clone()
    }

    pub fn reset(&self) {
        let cleared = {
            let mut handles = self.lock();
            let n = handles.len();
            handles.clear();
            n
        };
        info!(cleared, "per-model backends reset");
    }

    /// Number of entries with a live handle.
    pub fn count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<BackendHandle>>> {
        self.handles.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::BackendState;
    use tempfile::TempDir;

    fn registry(dir: &TempDir, src: &str) -> (Arc<ConfigStore>, ModelBackends) {
        let store = Arc::new(ConfigStore::new(dir.path().join("config.toml")));
        store.save(&toml::from_str(src).unwrap()).unwrap();
        (store.clone(), ModelBackends::new(store, None))
    }

    #[test]
    fn same_id_shares_one_handle() {
        let dir = TempDir::new().unwrap();
        let (_, reg) = registry(&dir, "[llm.local]\napi_type = \"dummy\"\n");
        let a = reg.handle("local");
        let b = reg.handle("local");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.status(), "uninitialized");
        assert!(matches!(a.get(), BackendState::Ready(_)));
        assert_eq!(reg.count(), 1);
    }

    #[test]
    fn reset_rebuilds_from_new_document() {
        let dir = TempDir::new().unwrap();
        let (store, reg) = registry(&dir, "[llm.local]\napi_type = \"carrier-pigeon\"\n");
        assert!(matches!(reg.handle("local").get(), BackendState::Unavailable(_)));

        store
            .save(&toml::from_str("[llm.local]\napi_type = \"dummy\"\n").unwrap())
            .unwrap();
        // Sticky until reset.
        assert!(matches!(reg.handle("local").get(), BackendState::Unavailable(_)));

        reg.reset();
        assert_eq!(reg.count(), 0);
        assert!(matches!(reg.handle("local").get(), BackendState::Ready(_)));
    }
}
