//! Application-wide error types.
//!
//! Per-component errors (`ConfigError`, `ProviderError`, `BridgeError`,
//! `UploadError`) live next to the code that raises them; `AppError` covers
//! process startup and the one-shot `ask` command.

use thiserror::Error;

use crate::bridge::BridgeError;
use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("settings error: {0}")]
    Settings(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("backend error: {0}")]
    Backend(#[from] BridgeError),

    #[error("server error: {0}")]
    Server(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
