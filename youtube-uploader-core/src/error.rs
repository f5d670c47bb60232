//! Error types shared by the core pipeline and the concrete clients.
//!
//! Errors from the YouTube API are surfaced as-is through [`ApiError`]; the
//! only interpretation done locally is [`ApiError::hint`], which picks a
//! human hint for the well-known failure reasons. Nothing is retried.

use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

/// Failure while loading or validating the metadata JSON.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Metadata file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read metadata file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse metadata JSON {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("snippet.title must not be empty")]
    EmptyTitle,

    #[error("snippet.title is {0} characters long, the limit is 100")]
    TitleTooLong(usize),

    #[error("snippet.description is {0} bytes long, the limit is 5000")]
    DescriptionTooLong(usize),

    #[error("{0} must not contain '<' or '>'")]
    InvalidCharacters(&'static str),

    #[error("snippet.tags add up to {0} characters, the limit is 500")]
    TagsTooLong(usize),
}

/// Failure while obtaining, refreshing or persisting OAuth2 credentials.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Client secret file not found: {0}")]
    ClientSecretNotFound(PathBuf),

    #[error("Invalid client secret file {path}: {reason}")]
    InvalidClientSecret { path: PathBuf, reason: String },

    #[error("Token cache {path} could not be accessed: {source}")]
    TokenCache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Token could not be serialised: {0}")]
    TokenFormat(#[from] serde_json::Error),

    #[error("Invalid OAuth endpoint URL {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("HTTP request to the OAuth endpoint failed: {0}")]
    Http(String),

    #[error("OAuth endpoint returned {error}{}", describe(.description))]
    Endpoint {
        error: String,
        description: Option<String>,
    },

    #[error("Unexpected reply from the OAuth endpoint: {0}")]
    UnexpectedResponse(String),

    #[error("OAuth state parameter did not match; the redirect was not for this request")]
    StateMismatch,

    #[error("Authorization was denied: {0}")]
    AuthorizationDenied(String),

    #[error("No authorization code was received")]
    MissingCode,

    #[error("The device code expired before authorization completed")]
    DeviceCodeExpired,

    #[error("Local browser flow failed ({0}); rerun with --device-auth or --manual-auth on headless machines")]
    Loopback(#[source] std::io::Error),

    #[error("Failed to read from the terminal: {0}")]
    Prompt(#[source] std::io::Error),
}

fn describe(description: &Option<String>) -> String {
    description
        .as_deref()
        .map(|d| format!(": {d}"))
        .unwrap_or_default()
}

fn list_reasons(reasons: &[String]) -> String {
    if reasons.is_empty() {
        String::new()
    } else {
        format!("; reasons: {}", reasons.join(", "))
    }
}

impl AuthError {
    /// True when the refresh token itself has been revoked or expired.
    pub fn is_invalid_grant(&self) -> bool {
        matches!(self, AuthError::Endpoint { error, .. } if error == "invalid_grant")
    }
}

/// Failure while uploading the video.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Video file not found: {0}")]
    VideoNotFound(PathBuf),

    #[error("Video file is empty: {0}")]
    EmptyVideo(PathBuf),

    #[error("Failed to read video file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error("Chunk size {0} is not a positive multiple of 262144 bytes")]
    InvalidChunkSize(usize),

    #[error("HTTP request to the YouTube API failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("YouTube did not return an upload session URI")]
    MissingSessionUri,

    #[error("Unexpected reply from the YouTube API: {0}")]
    UnexpectedResponse(String),
}

impl UploadError {
    pub fn hint(&self) -> Option<ApiHint> {
        match self {
            UploadError::Api(api) => Some(api.hint()),
            _ => None,
        }
    }
}

/// An error reply from a Google API, as documented for the Data API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message} (HTTP {status}{})", list_reasons(.reasons))]
pub struct ApiError {
    pub status: u16,
    pub message: String,
    pub reasons: Vec<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorItem>,
}

#[derive(Deserialize)]
struct ErrorItem {
    #[serde(default)]
    reason: String,
}

impl ApiError {
    /// Builds an `ApiError` from a reply body. Falls back to the raw text when
    /// the body is not the usual `{"error": {...}}` envelope.
    pub fn from_response(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => ApiError {
                status,
                message: if envelope.error.message.is_empty() {
                    format!("HTTP {status}")
                } else {
                    envelope.error.message
                },
                reasons: envelope
                    .error
                    .errors
                    .into_iter()
                    .map(|e| e.reason)
                    .filter(|r| !r.is_empty())
                    .collect(),
            },
            Err(_) => {
                let text = body.trim();
                ApiError {
                    status,
                    message: if text.is_empty() {
                        format!("HTTP {status}")
                    } else {
                        text.to_string()
                    },
                    reasons: Vec::new(),
                }
            }
        }
    }

    pub fn has_reason(&self, reason: &str) -> bool {
        self.reasons.iter().any(|r| r == reason) || self.message.contains(reason)
    }

    pub fn hint(&self) -> ApiHint {
        if self.has_reason("youtubeSignupRequired") {
            ApiHint::SignupRequired
        } else if self.has_reason("quotaExceeded") {
            ApiHint::QuotaExceeded
        } else {
            ApiHint::General
        }
    }
}

/// What to tell the user after an API failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiHint {
    SignupRequired,
    QuotaExceeded,
    General,
}

impl ApiHint {
    pub fn headline(self) -> &'static str {
        match self {
            ApiHint::SignupRequired | ApiHint::QuotaExceeded => "This error means:",
            ApiHint::General => "For troubleshooting, check:",
        }
    }

    pub fn lines(self) -> &'static [&'static str] {
        match self {
            ApiHint::SignupRequired => &[
                "Your Google account doesn't have a YouTube channel",
                "Please visit https://youtube.com and create a channel",
                "Then try uploading again",
            ],
            ApiHint::QuotaExceeded => &[
                "YouTube API quota has been exceeded",
                "Please try again later or request a quota increase",
            ],
            ApiHint::General => &[
                "YouTube channel exists and is active",
                "OAuth credentials have YouTube upload permissions",
                "Video file is in a supported format",
            ],
        }
    }
}
