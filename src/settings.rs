//! Process settings resolved at startup.
//!
//! Environment variables override the configuration document, which
//! overrides built-in defaults. [`Settings::from_env`] reads the real
//! environment; [`Settings::from_lookup`] takes any lookup function so tests
//! pass values directly instead of mutating env vars.

use std::path::PathBuf;

use tracing::warn;

use crate::config::{self, ConfigStore, Document, DEFAULT_MAX_CONCURRENT, DEFAULT_PORT};
use crate::error::AppError;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEV_SECRET_KEY: &str = "dev-secret-key-change-me";

#[derive(Debug, Clone)]
pub struct Settings {
    pub secret_key: String,
    pub config_path: PathBuf,
    pub bind_host: String,
    pub port: u16,
    pub debug: bool,
    pub log_level: String,
    /// `true` when `MANUS_LOG_LEVEL` was set, so it wins over `RUST_LOG`.
    pub log_level_explicit: bool,
    pub log_file: Option<PathBuf>,
    pub upload_dir: PathBuf,
    pub max_concurrent: usize,
    pub llm_api_key: Option<String>,
    /// Why the config document could not be used, when startup fell back
    /// to the built-in one. Logged by [`Settings::log_startup_warnings`].
    pub config_problem: Option<String>,
}

impl Settings {
    /// Load `.env` if present, then resolve from the process environment.
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from `lookup` and the document at the configured path.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let config_path = expand_home(&var("MANUS_CONFIG_PATH").unwrap_or_else(|| DEFAULT_CONFIG_PATH.into()));
        // Runs before the logger exists; the failure is kept and logged later.
        let (doc, config_problem) = match ConfigStore::new(&config_path).load() {
            Ok(doc) => (doc, None),
            Err(e) => (config::default_document(), Some(e.to_string())),
        };

        let secret_key = var("SECRET_KEY").unwrap_or_else(|| DEV_SECRET_KEY.to_string());

        let port = match var("PORT") {
            Some(raw) => parse_port(&raw)?,
            None => doc_port(&doc),
        };

        let max_concurrent = match var("MANUS_MAX_CONCURRENT") {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    AppError::Settings(format!("MANUS_MAX_CONCURRENT must be a positive integer, got '{raw}'"))
                })?,
            None => config::section_int(&doc, "system", "max_concurrent_requests")
                .and_then(|n| usize::try_from(n).ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_MAX_CONCURRENT),
        };

        let debug = match var("DEBUG") {
            Some(raw) => parse_flag(&raw)
                .ok_or_else(|| AppError::Settings(format!("DEBUG must be a boolean, got '{raw}'")))?,
            None => config::section_bool(&doc, "web", "debug").unwrap_or(false),
        };

        let explicit_level = var("MANUS_LOG_LEVEL");
        let log_level_explicit = explicit_level.is_some();
        let log_level = explicit_level.unwrap_or_else(|| if debug { "debug" } else { "info" }.to_string());

        Ok(Self {
            secret_key,
            config_path,
            bind_host: var("MANUS_BIND_HOST").unwrap_or_else(|| DEFAULT_BIND_HOST.into()),
            port,
            debug,
            log_level,
            log_level_explicit,
            log_file: var("MANUS_LOG_FILE").map(|p| expand_home(&p)),
            upload_dir: expand_home(&var("MANUS_UPLOAD_DIR").unwrap_or_else(|| DEFAULT_UPLOAD_DIR.into())),
            max_concurrent,
            llm_api_key: var("LLM_API_KEY"),
            config_problem,
        })
    }

    /// `true` when `SECRET_KEY` was unset and the placeholder is in use.
    pub fn uses_dev_secret(&self) -> bool {
        self.secret_key == DEV_SECRET_KEY
    }

    /// Log settings problems that are not fatal. Call after the logger is up.
    pub fn log_startup_warnings(&self) {
        if let Some(problem) = &self.config_problem {
            warn!(error = %problem, "using built-in default configuration");
        }
        if self.uses_dev_secret() {
            warn!("SECRET_KEY not set; using a development placeholder");
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(home) = dirs::home_dir() {
        if path == "~" {
            return home;
        }
        if let Some(rest) = path.strip_prefix("~/") {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

fn parse_port(raw: &str) -> Result<u16, AppError> {
    raw.parse::<u16>()
        .ok()
        .filter(|p| *p > 0)
        .ok_or_else(|| AppError::Settings(format!("PORT must be in 1..=65535, got '{raw}'")))
}

fn doc_port(doc: &Document) -> u16 {
    config::section_int(doc, "web", "port")
        .and_then(|p| u16::try_from(p).ok())
        .filter(|p| *p > 0)
        .unwrap_or(DEFAULT_PORT)
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
