//! Upload storage for `POST /api/upload`.
//!
//! Each file lands in the upload directory as `<uuid>_<sanitized name>`.
//! The uuid is returned to the browser as the file id.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No file part")]
    NoFilePart,
    #[error("No selected file")]
    NoSelectedFile,
    #[error("malformed upload: {0}")]
    Malformed(String),
    #[error("cannot store upload: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// `true` for errors caused by the request rather than the server.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, UploadError::Io(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredUpload {
    pub file_id: String,
    pub filename: String,
    pub size: u64,
    #[serde(skip)]
    pub path: PathBuf,
}

/// Write `bytes` under `dir` and describe the stored file.
pub async fn store(dir: &Path, original_name: &str, bytes: &[u8]) -> Result<StoredUpload, UploadError> {
    let filename = sanitize_filename(original_name);
    if filename.is_empty() {
        return Err(UploadError::NoSelectedFile);
    }

    tokio::fs::create_dir_all(dir).await?;

    let file_id = Uuid::new_v4().to_string();
    let path = dir.join(format!("{file_id}_{filename}"));
    tokio::fs::write(&path, bytes).await?;

    info!(%file_id, %filename, size = bytes.len(), "upload stored");
    Ok(StoredUpload {
        file_id,
        filename,
        size: bytes.len() as u64,
        path,
    })
}

/// Keep only the final path component and replace anything outside
/// `[A-Za-z0-9._-]` with `_`. Leading dots are dropped.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    cleaned.trim_start_matches('.').trim().to_string()
}
