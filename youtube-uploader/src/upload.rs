//! YouTube Data API client implementing [`VideoUploader`].
//!
//! # Resumable upload
//!
//! 1. **Initiate:** `POST {base}/upload/youtube/v3/videos?uploadType=resumable&part=...`
//!    with the metadata JSON and `X-Upload-Content-Length`/`X-Upload-Content-Type`.
//!    The session URI comes back in `Location`.
//! 2. **Upload:** `PUT` consecutive chunks to the session URI with
//!    `Content-Range: bytes a-b/total`. `308` means "keep going" and carries the
//!    acknowledged `Range: bytes=0-N`; `200`/`201` carries the video resource.
//!
//! Non-success replies become [`ApiError`]s. Nothing is retried; a session
//! that stops advancing is reported as an error.

use std::io::SeekFrom;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_RANGE, LOCATION, RANGE};
use reqwest::{Client, StatusCode};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use youtube_uploader_core::config::{validate_chunk_size, DEFAULT_CHUNK_SIZE};
use youtube_uploader_core::contract::{
    NoProgress, ProgressSink, UploadRequest, UploadedVideo, VideoUploader,
};
use youtube_uploader_core::error::{ApiError, UploadError};

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com";

pub struct YouTubeClient {
    http: Client,
    base_url: String,
    access_token: String,
    chunk_size: usize,
    progress: Arc<dyn ProgressSink>,
}

impl YouTubeClient {
    pub fn new(access_token: impl Into<String>) -> Result<Self, UploadError> {
        // 308 is "Resume Incomplete" here, not a redirect to follow.
        let http = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            http,
            base_url: DEFAULT_API_BASE.to_string(),
            access_token: access_token.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress: Arc::new(NoProgress),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Result<Self, UploadError> {
        self.chunk_size = validate_chunk_size(chunk_size)?;
        Ok(self)
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    async fn start_session(&self, request: &UploadRequest) -> Result<String, UploadError> {
        let url = format!("{}/upload/youtube/v3/videos", self.base_url);
        let parts = request.metadata.parts();
        tracing::info!(%parts, bytes = request.content_length, "Initiating resumable upload session");

        let response = self
            .http
            .post(&url)
            .query(&[("uploadType", "resumable"), ("part", parts.as_str())])
            .header(AUTHORIZATION, self.bearer())
            .header("X-Upload-Content-Length", request.content_length.to_string())
            .header("X-Upload-Content-Type", request.content_type.as_str())
            .json(&request.metadata.to_request_body())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = ApiError::from_response(status.as_u16(), &body);
            tracing::error!(error = %err, "Upload session was not created");
            return Err(err.into());
        }

        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or(UploadError::MissingSessionUri)
    }

    async fn send_chunks(
        &self,
        session_uri: &str,
        request: &UploadRequest,
    ) -> Result<UploadedVideo, UploadError> {
        let path = &request.video_path;
        let io_err = |source| UploadError::Io {
            path: path.clone(),
            source,
        };
        let mut file = tokio::fs::File::open(path).await.map_err(io_err)?;
        let total = request.content_length;
        let mut offset: u64 = 0;

        loop {
            let end = offset.saturating_add(self.chunk_size as u64).min(total);
            let mut chunk = vec![0u8; (end - offset) as usize];
            file.seek(SeekFrom::Start(offset)).await.map_err(io_err)?;
            file.read_exact(&mut chunk).await.map_err(io_err)?;

            tracing::debug!(offset, end, total, "Sending chunk");
            let response = self
                .http
                .put(session_uri)
                .header(AUTHORIZATION, self.bearer())
                .header(CONTENT_RANGE, format!("bytes {}-{}/{}", offset, end - 1, total))
                .body(chunk)
                .send()
                .await?;

            let status = response.status();
            if status == StatusCode::OK || status == StatusCode::CREATED {
                let resource: serde_json::Value = response.json().await?;
                let id = resource
                    .get("id")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        UploadError::UnexpectedResponse(
                            "final reply has no video id".to_string(),
                        )
                    })?;
                self.progress.advance(total, total);
                tracing::info!(video_id = %id, "Resumable upload completed");
                return Ok(UploadedVideo { id, resource });
            }

            if status == StatusCode::PERMANENT_REDIRECT {
                let range = response
                    .headers()
                    .get(RANGE)
                    .and_then(|v| v.to_str().ok());
                let next = next_offset(range);
                if next <= offset || next >= total {
                    return Err(UploadError::UnexpectedResponse(format!(
                        "upload stopped advancing at byte {next} of {total}"
                    )));
                }
                offset = next;
                self.progress.advance(offset, total);
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            let err = ApiError::from_response(status.as_u16(), &body);
            tracing::error!(error = %err, offset, "Chunk upload failed");
            return Err(err.into());
        }
    }
}

/// First byte the server has not yet stored, from a `Range: bytes=0-N` header.
pub fn next_offset(range: Option<&str>) -> u64 {
    range
        .and_then(|r| r.trim().strip_prefix("bytes="))
        .and_then(|r| r.split('-').nth(1))
        .and_then(|last| last.trim().parse::<u64>().ok())
        .map(|last| last.saturating_add(1))
        .unwrap_or(0)
}

#[async_trait]
impl VideoUploader for YouTubeClient {
    async fn upload(&self, request: UploadRequest) -> Result<UploadedVideo, UploadError> {
        let session_uri = self.start_session(&request).await?;
        tracing::debug!("Upload session created");
        self.progress.start(request.content_length);
        let result = self.send_chunks(&session_uri, &request).await;
        // The bar is cleared on every outcome, transport errors included.
        self.progress.finish();
        result
    }
}
