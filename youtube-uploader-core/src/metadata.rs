//! Video metadata: the `snippet`/`status` body sent with the upload.
//!
//! The JSON file mirrors the YouTube `videos` resource, so keys are the API's
//! camelCase names:
//!
//! ```json
//! {
//!   "snippet": {
//!     "title": "My video",
//!     "description": "Uploaded from the command line",
//!     "tags": ["rust", "cli"],
//!     "categoryId": "22"
//!   },
//!   "status": { "privacyStatus": "private" }
//! }
//! ```
//!
//! Fields this crate does not model (`snippet.defaultLanguage`,
//! `status.selfDeclaredMadeForKids`, `recordingDetails`, ...) are kept in the
//! `extra` maps and sent unchanged.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::MetadataError;

const MAX_TITLE_CHARS: usize = 100;
const MAX_DESCRIPTION_BYTES: usize = 5000;
const MAX_TAGS_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub snippet: VideoSnippet,
    #[serde(default)]
    pub status: VideoStatus,
    /// Other resource parts, passed through as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatus {
    #[serde(default)]
    pub privacy_status: PrivacyStatus,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyStatus {
    Public,
    #[default]
    Private,
    Unlisted,
}

impl std::fmt::Display for PrivacyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            PrivacyStatus::Public => "public",
            PrivacyStatus::Private => "private",
            PrivacyStatus::Unlisted => "unlisted",
        })
    }
}

impl VideoMetadata {
    /// Checks the limits YouTube enforces on snippet fields, so an invalid file
    /// fails before any bytes are sent.
    pub fn validate(&self) -> Result<(), MetadataError> {
        let title = self.snippet.title.trim();
        if title.is_empty() {
            return Err(MetadataError::EmptyTitle);
        }
        let title_chars = self.snippet.title.chars().count();
        if title_chars > MAX_TITLE_CHARS {
            return Err(MetadataError::TitleTooLong(title_chars));
        }
        if has_angle_brackets(&self.snippet.title) {
            return Err(MetadataError::InvalidCharacters("snippet.title"));
        }
        let description_bytes = self.snippet.description.len();
        if description_bytes > MAX_DESCRIPTION_BYTES {
            return Err(MetadataError::DescriptionTooLong(description_bytes));
        }
        if has_angle_brackets(&self.snippet.description) {
            return Err(MetadataError::InvalidCharacters("snippet.description"));
        }
        let tags_chars = tags_length(&self.snippet.tags);
        if tags_chars > MAX_TAGS_CHARS {
            return Err(MetadataError::TagsTooLong(tags_chars));
        }
        Ok(())
    }

    /// Value for the `part` query parameter: every resource part in the body.
    pub fn parts(&self) -> String {
        let mut parts = vec!["snippet".to_string(), "status".to_string()];
        parts.extend(
            self.extra
                .iter()
                .filter(|(_, v)| v.is_object())
                .map(|(k, _)| k.clone()),
        );
        parts.join(",")
    }

    pub fn to_request_body(&self) -> Value {
        // Serialising plain maps and strings cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn has_angle_brackets(s: &str) -> bool {
    s.contains('<') || s.contains('>')
}

/// YouTube counts a tag containing a space as if it were quoted, and adds one
/// separator between tags.
fn tags_length(tags: &[String]) -> usize {
    let chars: usize = tags
        .iter()
        .map(|t| t.chars().count() + if t.contains(' ') { 2 } else { 0 })
        .sum();
    chars + tags.len().saturating_sub(1)
}

/// Reads and parses the metadata JSON file. Validation is a separate step, see
/// [`VideoMetadata::validate`].
pub fn load_metadata<P: AsRef<Path>>(path: P) -> Result<VideoMetadata, MetadataError> {
    let path = path.as_ref();
    info!(metadata_path = %path.display(), "Loading video metadata");

    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            MetadataError::NotFound(path.to_path_buf())
        } else {
            MetadataError::Io {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    let metadata: VideoMetadata =
        serde_json::from_str(&content).map_err(|e| MetadataError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;

    debug!(
        title = %metadata.snippet.title,
        privacy = %metadata.status.privacy_status,
        tags = metadata.snippet.tags.len(),
        "Parsed video metadata"
    );
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> VideoMetadata {
        serde_json::from_value(json!({
            "snippet": {
                "title": "Test Video Title",
                "description": "A description",
                "tags": ["one", "two words"],
                "categoryId": "22"
            },
            "status": { "privacyStatus": "private" }
        }))
        .unwrap()
    }

    #[test]
    fn missing_status_defaults_to_private() {
        let m: VideoMetadata = serde_json::from_value(json!({
            "snippet": { "title": "t" }
        }))
        .unwrap();
        assert_eq!(m.status.privacy_status, PrivacyStatus::Private);
        assert!(m.snippet.tags.is_empty());
        assert_eq!(m.snippet.category_id, None);
    }

    #[test]
    fn unknown_privacy_is_rejected() {
        let res: Result<VideoMetadata, _> = serde_json::from_value(json!({
            "snippet": { "title": "t" },
            "status": { "privacyStatus": "secret" }
        }));
        assert!(res.is_err());
    }

    #[test]
    fn unknown_fields_round_trip_into_the_request_body() {
        let m: VideoMetadata = serde_json::from_value(json!({
            "snippet": { "title": "t", "defaultLanguage": "en" },
            "status": { "privacyStatus": "unlisted", "selfDeclaredMadeForKids": false },
            "recordingDetails": { "recordingDate": "2024-01-01T00:00:00Z" }
        }))
        .unwrap();
        let body = m.to_request_body();
        assert_eq!(body["snippet"]["defaultLanguage"], "en");
        assert_eq!(body["status"]["privacyStatus"], "unlisted");
        assert_eq!(body["status"]["selfDeclaredMadeForKids"], false);
        assert_eq!(
            body["recordingDetails"]["recordingDate"],
            "2024-01-01T00:00:00Z"
        );
        assert_eq!(m.parts(), "snippet,status,recordingDetails");
    }

    #[test]
    fn request_body_uses_api_key_names() {
        let body = sample().to_request_body();
        assert_eq!(body["snippet"]["categoryId"], "22");
        assert_eq!(body["snippet"]["tags"], json!(["one", "two words"]));
        assert_eq!(body["status"]["privacyStatus"], "private");
        assert!(body["snippet"].get("category_id").is_none());
    }

    #[test]
    fn validate_accepts_sample() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn validate_rejects_blank_and_long_titles() {
        let mut m = sample();
        m.snippet.title = "   ".into();
        assert!(matches!(m.validate(), Err(MetadataError::EmptyTitle)));

        m.snippet.title = "x".repeat(101);
        assert!(matches!(m.validate(), Err(MetadataError::TitleTooLong(101))));

        m.snippet.title = "é".repeat(100);
        assert!(m.validate().is_ok());
    }

    #[test]
    fn validate_rejects_angle_brackets() {
        let mut m = sample();
        m.snippet.description = "see <here>".into();
        assert!(matches!(
            m.validate(),
            Err(MetadataError::InvalidCharacters("snippet.description"))
        ));
    }

    #[test]
    fn tags_length_counts_quotes_and_separators() {
        assert_eq!(tags_length(&[]), 0);
        assert_eq!(tags_length(&["ab".into(), "c d".into()]), 2 + 5 + 1);

        let mut m = sample();
        m.snippet.tags = vec!["x".repeat(250), "y".repeat(250)];
        assert!(matches!(m.validate(), Err(MetadataError::TagsTooLong(501))));
    }
}
