//! [`BackendHandle`]: the lazily built backend shared by all requests.
//!
//! The factory runs at most once per lifecycle, under the handle's lock, on
//! the first [`BackendHandle::get`]. Its outcome is sticky: a built backend
//! is handed out forever, and a failed build keeps reporting the same reason
//! until an operator calls [`BackendHandle::reset`].

use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use super::{Backend, ProviderError};

/// Builds the backend on first use.
pub type BackendFactory = Box<dyn Fn() -> Result<Arc<dyn Backend>, ProviderError> + Send + Sync>;

/// Result of [`BackendHandle::get`].
#[derive(Clone)]
pub enum BackendState {
    Ready(Arc<dyn Backend>),
    Unavailable(String),
}

enum Slot {
    Uninitialized,
    Ready(Arc<dyn Backend>),
    Unavailable(String),
}

pub struct BackendHandle {
    factory: BackendFactory,
    slot: Mutex<Slot>,
}

impl BackendHandle {
    pub fn new(factory: BackendFactory) -> Self {
        Self { factory, slot: Mutex::new(Slot::Uninitialized) }
    }

    /// A handle that is already `Ready` with `backend`.
    pub fn ready(backend: Arc<dyn Backend>) -> Self {
        let handle = Self::new(Box::new(|| Err(ProviderError::Request("factory not set".into()))));
        *handle.lock() = Slot::Ready(backend);
        handle
    }

    pub fn get(&self) -> BackendState {
        let mut slot = self.lock();
        match &*slot {
            Slot::Ready(b) => return BackendState::Ready(b.clone()),
            Slot::Unavailable(reason) => return BackendState::Unavailable(reason.clone()),
            Slot::Uninitialized => {}
        }

        match (self.factory)() {
            Ok(backend) => {
                info!(backend = backend.name(), "backend ready");
                *slot = Slot::Ready(backend.clone());
                BackendState::Ready(backend)
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(%reason, "backend unavailable");
                *slot = Slot::Unavailable(reason.clone());
                BackendState::Unavailable(reason)
            }
        }
    }

    /// Drop the cached outcome; the next `get` runs the factory again.
    pub fn reset(&self) {
        *self.lock() = Slot::Uninitialized;
        info!("backend handle reset");
    }

    /// `"uninitialized"`, `"ready"` or `"unavailable"`. Never runs the factory.
    pub fn status(&self) -> &'static str {
        match &*self.lock() {
            Slot::Uninitialized => "uninitialized",
            Slot::Ready(_) => "ready",
            Slot::Unavailable(_) => "unavailable",
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|p| p.into_inner())
    }
}
