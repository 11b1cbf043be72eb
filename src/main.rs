//! Entry point for the `manus-panel` binary.
//!
//! # Usage
//!
//! ```text
//! manus-panel [serve]                    run the web panel (default)
//! manus-panel ask [--model <id>] <text>  one completion, printed to stdout
//! manus-panel --help
//! ```
//!
//! Startup sequence:
//!   1. Load .env (if present) and resolve settings
//!   2. Init logger
//!   3. Run the requested command

use std::sync::Arc;

use manus_panel::bridge;
use manus_panel::config::{ConfigStore, ModelCatalog};
use manus_panel::error::AppError;
use manus_panel::llm::{BackendHandle, BackendState, ChatMessage, providers};
use manus_panel::settings::Settings;
use manus_panel::{build_state, http, logger};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const USAGE: &str = "\
usage: manus-panel [serve]
       manus-panel ask [--model <id>] <message...>

environment:
  PORT, DEBUG, SECRET_KEY, MANUS_CONFIG_PATH, MANUS_MAX_CONCURRENT,
  MANUS_BIND_HOST, MANUS_LOG_LEVEL, MANUS_LOG_FILE, MANUS_UPLOAD_DIR,
  LLM_API_KEY";

enum Command {
    Serve,
    Ask { model: Option<String>, message: String },
    Help,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    let command = parse_args(std::env::args().skip(1))?;
    if let Command::Help = command {
        println!("{USAGE}");
        return Ok(());
    }

    let settings = Settings::from_env()?;
    logger::init(&settings.log_level, settings.log_level_explicit, settings.log_file.as_deref())?;
    settings.log_startup_warnings();

    match command {
        Command::Serve => serve(settings),
        Command::Ask { model, message } => ask(&settings, model, message),
        Command::Help => Ok(()),
    }
}

// ── CLI arg parsing ───────────────────────────────────────────────────────────

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Command, AppError> {
    match args.next().as_deref() {
        None | Some("serve") => Ok(Command::Serve),
        Some("--help") | Some("-h") | Some("help") => Ok(Command::Help),
        Some("ask") => {
            let mut model = None;
            let mut words = Vec::new();
            while let Some(arg) = args.next() {
                if arg == "--model" {
                    model = Some(
                        args.next()
                            .ok_or_else(|| AppError::Settings("--model needs a value".into()))?,
                    );
                } else {
                    words.push(arg);
                }
            }
            let message = words.join(" ");
            if message.trim().is_empty() {
                return Err(AppError::Settings(format!("ask needs a message\n{USAGE}")));
            }
            Ok(Command::Ask { model, message })
        }
        Some(other) => Err(AppError::Settings(format!("unknown command '{other}'\n{USAGE}"))),
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn serve(settings: Settings) -> Result<(), AppError> {
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;

    runtime.block_on(async move {
        let state = build_state(&settings);
        let shutdown = CancellationToken::new();

        let signal_token = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("ctrl-c received, shutting down");
                    signal_token.cancel();
                }
                Err(e) => warn!(error = %e, "cannot listen for ctrl-c"),
            }
        });

        http::serve(&settings.bind_addr(), state, shutdown).await
    })
}

/// One completion through the same backend path the panel uses, on a
/// throwaway runtime.
fn ask(settings: &Settings, model: Option<String>, message: String) -> Result<(), AppError> {
    let store = Arc::new(ConfigStore::new(&settings.config_path));
    let handle = BackendHandle::new(providers::factory(store.clone(), settings.llm_api_key.clone()));

    let backend = match handle.get() {
        BackendState::Ready(backend) => backend,
        BackendState::Unavailable(reason) => {
            return Err(AppError::Server(format!("backend unavailable: {reason}")));
        }
    };

    let model = model.unwrap_or_else(|| {
        ModelCatalog::from_document(&store.load_or_default())
            .default_model_id()
            .to_string()
    });
    info!(%model, backend = backend.name(), "asking");

    let messages = vec![ChatMessage::user(message)];
    let reply = bridge::invoke_blocking(async move { backend.ask(&model, &messages).await })?;
    println!("{reply}");
    Ok(())
}
