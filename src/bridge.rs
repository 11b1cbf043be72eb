//! Runs one backend call per request in its own task.
//!
//! [`invoke`] spawns the call onto the current Tokio runtime and awaits it.
//! If the awaiting request is dropped (client went away, deadline hit), the
//! spawned task is aborted with it. A panic inside the call surfaces as
//! [`BridgeError::Panicked`] instead of tearing down the handler.
//!
//! [`invoke_blocking`] serves synchronous call sites: it builds a
//! current-thread runtime for the single call and drops it before returning.
//!
//! Neither imposes a timeout; wrap the future in `tokio::time::timeout` at
//! the call site.

use std::fmt::Display;
use std::future::Future;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::warn;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// The call itself returned an error.
    #[error("backend error: {0}")]
    Backend(String),

    /// The call panicked.
    #[error("backend call panicked: {0}")]
    Panicked(String),

    /// The task could not be run to completion.
    #[error("runtime error: {0}")]
    Runtime(String),
}

/// Aborts the wrapped task when dropped before completion.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run `call` as a separate task and return its result.
///
/// Must be called from within a Tokio runtime.
pub async fn invoke<F, T, E>(call: F) -> Result<T, BridgeError>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Display + Send + 'static,
{
    let mut task = AbortOnDrop(tokio::spawn(call));

    match (&mut task.0).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            warn!(error = %e, "backend call failed");
            Err(BridgeError::Backend(e.to_string()))
        }
        Err(join_err) if join_err.is_panic() => {
            let payload = join_err.into_panic();
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            warn!(%message, "backend call panicked");
            Err(BridgeError::Panicked(message))
        }
        Err(join_err) => Err(BridgeError::Runtime(join_err.to_string())),
    }
}

/// Run `call` to completion on a fresh current-thread runtime.
///
/// For synchronous callers only; calling this from inside a runtime panics.
pub fn invoke_blocking<F, T, E>(call: F) -> Result<T, BridgeError>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Display + Send + 'static,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| BridgeError::Runtime(format!("cannot build runtime: {e}")))?;
    runtime.block_on(invoke(call))
}
