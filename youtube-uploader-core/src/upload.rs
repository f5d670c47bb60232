//! Upload pipeline: metadata file + video file → one resumable upload.
//!
//! [`upload_video`] does the local work (loading and validating the metadata,
//! checking the video file, picking a content type) and hands a complete
//! [`UploadRequest`] to a [`VideoUploader`]. The uploader owns the protocol;
//! this module never talks HTTP.
//!
//! # Error Handling
//! Local problems are reported before anything is sent. Errors from the
//! uploader are returned unchanged.

use std::path::Path;

use serde::Serialize;
use tracing::{error, info};

use crate::contract::{UploadRequest, VideoUploader};
use crate::error::UploadError;
use crate::metadata::load_metadata;

const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadReport {
    pub video_id: String,
    pub watch_url: String,
    /// The `videos` resource returned by the API.
    pub resource: serde_json::Value,
}

pub fn watch_url(video_id: &str) -> String {
    format!("{WATCH_URL_PREFIX}{video_id}")
}

/// MIME type announced for the upload, from the file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        Some("avi") => "video/x-msvideo",
        Some("wmv") => "video/x-ms-wmv",
        Some("flv") => "video/x-flv",
        Some("mpg") | Some("mpeg") => "video/mpeg",
        Some("3gp") => "video/3gpp",
        _ => "application/octet-stream",
    }
}

pub async fn upload_video<U>(
    uploader: &U,
    video_path: &Path,
    metadata_path: &Path,
) -> Result<UploadReport, UploadError>
where
    U: VideoUploader + ?Sized,
{
    let metadata = load_metadata(metadata_path)?;
    metadata.validate()?;

    let content_length = match tokio::fs::metadata(video_path).await {
        Ok(m) if m.is_file() => m.len(),
        Ok(_) => return Err(UploadError::VideoNotFound(video_path.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(UploadError::VideoNotFound(video_path.to_path_buf()))
        }
        Err(e) => {
            return Err(UploadError::Io {
                path: video_path.to_path_buf(),
                source: e,
            })
        }
    };
    if content_length == 0 {
        return Err(UploadError::EmptyVideo(video_path.to_path_buf()));
    }

    let request = UploadRequest {
        video_path: video_path.to_path_buf(),
        content_type: content_type_for(video_path).to_string(),
        content_length,
        metadata,
    };
    info!(
        video = %video_path.display(),
        bytes = content_length,
        content_type = %request.content_type,
        title = %request.metadata.snippet.title,
        "Starting upload"
    );

    match uploader.upload(request).await {
        Ok(video) => {
            info!(video_id = %video.id, "Upload finished");
            Ok(UploadReport {
                watch_url: watch_url(&video.id),
                video_id: video.id,
                resource: video.resource,
            })
        }
        Err(e) => {
            error!(error = %e, video = %video_path.display(), "Upload failed");
            Err(e)
        }
    }
}
