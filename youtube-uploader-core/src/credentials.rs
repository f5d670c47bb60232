//! OAuth2 client secret, as downloaded from the Google Cloud console.
//!
//! The file wraps the client fields in an `installed` (desktop app) or `web`
//! object:
//!
//! ```json
//! { "installed": { "client_id": "...", "client_secret": "...",
//!                  "auth_uri": "https://accounts.google.com/o/oauth2/auth",
//!                  "token_uri": "https://oauth2.googleapis.com/token",
//!                  "redirect_uris": ["http://localhost"] } }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AuthError;

pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_DEVICE_AUTH_URI: &str = "https://oauth2.googleapis.com/device/code";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default = "default_device_auth_uri")]
    pub device_auth_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

fn default_device_auth_uri() -> String {
    DEFAULT_DEVICE_AUTH_URI.to_string()
}

#[derive(Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

impl ClientSecret {
    /// Redirect URI used by the manual flow: the first one registered for the
    /// client, or `http://localhost`.
    pub fn manual_redirect_uri(&self) -> &str {
        self.redirect_uris
            .first()
            .map(String::as_str)
            .unwrap_or("http://localhost")
    }
}

pub fn load_client_secret<P: AsRef<Path>>(path: P) -> Result<ClientSecret, AuthError> {
    let path = path.as_ref();
    info!(client_secret_path = %path.display(), "Loading OAuth client secret");

    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AuthError::ClientSecretNotFound(path.to_path_buf())
        } else {
            AuthError::InvalidClientSecret {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        }
    })?;

    let file: ClientSecretFile =
        serde_json::from_str(&content).map_err(|e| AuthError::InvalidClientSecret {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    file.installed
        .or(file.web)
        .ok_or_else(|| AuthError::InvalidClientSecret {
            path: path.to_path_buf(),
            reason: "expected an \"installed\" or \"web\" object".to_string(),
        })
}
