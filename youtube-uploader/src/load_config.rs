/// `load_config` module: merges CLI flags, environment and an optional YAML
/// file into the core [`UploaderConfig`].
///
/// Precedence is CLI flag > environment > YAML > default. clap already folds
/// the environment into the flag values (`#[clap(env = ...)]`), so this module
/// only has to lay the YAML file underneath.
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use youtube_uploader_core::auth::AuthMode;
use youtube_uploader_core::config::{validate_chunk_size, UploaderConfig};

use crate::cli::Cli;

/// Settings accepted in the YAML file. Every key is optional.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub client_secret_file: Option<PathBuf>,
    pub token_file: Option<PathBuf>,
    pub auth_mode: Option<AuthMode>,
    pub chunk_size: Option<usize>,
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<FileConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow!("Failed to read config file {:?}: {}", path_ref, e));
        }
    };

    // An empty file parses as YAML null.
    if config_content.trim().is_empty() {
        return Ok(FileConfig::default());
    }

    match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            Ok(conf)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            Err(anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}

/// Builds the run configuration from parsed arguments.
pub fn resolve_config(cli: &Cli) -> Result<UploaderConfig> {
    let file = match &cli.config {
        Some(path) => load_config(path)?,
        None => FileConfig::default(),
    };

    let client_secret_file = cli
        .client_secret
        .clone()
        .or(file.client_secret_file)
        .ok_or_else(|| {
            error!("No client secret file configured");
            anyhow!(
                "CLIENT_SECRET_FILE not set. Pass --client-secret, set CLIENT_SECRET_FILE \
                 (a .env file works) or add client_secret_file to the config file"
            )
        })?;

    if !client_secret_file.is_file() {
        error!(path = %client_secret_file.display(), "Client secret file missing");
        return Err(anyhow!(
            "Client secret file not found: {}",
            client_secret_file.display()
        ));
    }

    let mut config = UploaderConfig::new(client_secret_file);
    if let Some(token_file) = cli.token_file.clone().or(file.token_file) {
        config.token_file = token_file;
    }
    config.auth_mode = cli.auth_mode().or(file.auth_mode).unwrap_or_default();
    if let Some(chunk_size) = cli.chunk_size.or(file.chunk_size) {
        config.chunk_size = validate_chunk_size(chunk_size)?;
    }

    Ok(config)
}
