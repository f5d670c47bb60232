use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::auth::AuthMode;
use crate::error::UploadError;

pub const DEFAULT_TOKEN_FILE: &str = "token.json";
/// Chunks must be a multiple of this many bytes, except the last one.
pub const CHUNK_GRANULARITY: usize = 256 * 1024;
pub const DEFAULT_CHUNK_SIZE: usize = 32 * CHUNK_GRANULARITY;

/// Resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploaderConfig {
    pub client_secret_file: PathBuf,
    pub token_file: PathBuf,
    pub auth_mode: AuthMode,
    pub chunk_size: usize,
}

impl UploaderConfig {
    pub fn new(client_secret_file: impl Into<PathBuf>) -> Self {
        Self {
            client_secret_file: client_secret_file.into(),
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
            auth_mode: AuthMode::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            client_secret = %self.client_secret_file.display(),
            token_file = %self.token_file.display(),
            auth_mode = ?self.auth_mode,
            chunk_size = self.chunk_size,
            "Loaded UploaderConfig"
        );
        debug!(?self, "UploaderConfig loaded (full debug)");
    }
}

pub fn validate_chunk_size(chunk_size: usize) -> Result<usize, UploadError> {
    if chunk_size == 0 || chunk_size % CHUNK_GRANULARITY != 0 {
        return Err(UploadError::InvalidChunkSize(chunk_size));
    }
    Ok(chunk_size)
}
