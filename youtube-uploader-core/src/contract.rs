#![allow(unused)]

//! # contract: interfaces between the pipeline and the outside world
//!
//! Two remote services are involved in an upload: Google's OAuth2 endpoints
//! and the YouTube Data API. Each sits behind a trait so the pipeline can be
//! driven by the real reqwest clients (see the `youtube-uploader` crate) or by
//! `mockall` mocks in tests.
//!
//! ## Mocking & Testing
//! - [`OAuthClient`] and [`VideoUploader`] are annotated with `automock`; the
//!   generated `MockOAuthClient` / `MockVideoUploader` are exported under the
//!   default `test-export-mocks` feature so downstream tests can use them.
//! - [`ProgressSink`] is a plain callback trait; [`NoProgress`] ignores all
//!   updates.

use std::path::PathBuf;

use async_trait::async_trait;
use mockall::{automock, predicate::*};
use oauth2::{CsrfToken, PkceCodeChallenge, PkceCodeVerifier};
use serde::{Deserialize, Serialize};

use crate::auth::token::TokenResponse;
use crate::error::{AuthError, UploadError};
use crate::metadata::VideoMetadata;

/// Reply of the device authorization endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAuthorization {
    pub device_code: String,
    pub user_code: String,
    /// Google calls this `verification_url`, RFC 8628 `verification_uri`.
    #[serde(alias = "verification_uri")]
    pub verification_url: String,
    pub expires_in: u64,
    #[serde(default = "default_poll_interval")]
    pub interval: u64,
}

fn default_poll_interval() -> u64 {
    5
}

/// Client for Google's OAuth2 endpoints.
///
/// Implementors own the client id/secret and endpoint URLs; callers only pass
/// per-request values.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait OAuthClient: Send + Sync {
    /// Consent page URL for the authorization-code flow (PKCE S256).
    fn authorization_url(
        &self,
        redirect_uri: &str,
        state: &CsrfToken,
        pkce_challenge: &PkceCodeChallenge,
    ) -> Result<String, AuthError>;

    /// Registered redirect URI used when the code is pasted back by hand.
    fn manual_redirect_uri(&self) -> String;

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        pkce_verifier: Option<PkceCodeVerifier>,
    ) -> Result<TokenResponse, AuthError>;

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthError>;

    async fn request_device_code(&self) -> Result<DeviceAuthorization, AuthError>;

    /// Polls the token endpoint until the user approves. Honors the interval
    /// and `slow_down`; `access_denied` and `expired_token` end the wait.
    async fn wait_for_device_token(
        &self,
        authorization: &DeviceAuthorization,
    ) -> Result<TokenResponse, AuthError>;
}

/// Everything the uploader needs to send one video.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub video_path: PathBuf,
    /// MIME type announced in `X-Upload-Content-Type`.
    pub content_type: String,
    pub content_length: u64,
    pub metadata: VideoMetadata,
}

/// The created video as returned by the API.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedVideo {
    pub id: String,
    /// Full `videos` resource from the final reply.
    pub resource: serde_json::Value,
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait VideoUploader: Send + Sync {
    async fn upload(&self, request: UploadRequest) -> Result<UploadedVideo, UploadError>;
}

/// Receives byte counts as chunks are acknowledged by the server.
pub trait ProgressSink: Send + Sync {
    fn start(&self, total: u64);
    fn advance(&self, sent: u64, total: u64);
    fn finish(&self);
}

pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn start(&self, _total: u64) {}
    fn advance(&self, _sent: u64, _total: u64) {}
    fn finish(&self) {}
}
