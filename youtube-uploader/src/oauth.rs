//! # Google OAuth2 client
//!
//! [`OAuthClient`] implemented with the `oauth2` crate against the endpoints in
//! the client secret file. Client credentials travel in the request body, which
//! is what Google expects from installed apps. Error replies
//! (`{"error": "...", "error_description": "..."}`) are mapped to
//! [`AuthError::Endpoint`].
//!
//! Tokens are never logged.

use std::borrow::Cow;

use async_trait::async_trait;
use oauth2::basic::{BasicClient, BasicErrorResponse, BasicTokenResponse, BasicTokenType};
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, CsrfToken, DeviceAuthorizationUrl,
    DeviceCodeErrorResponse, DeviceCodeErrorResponseType, EndpointNotSet, EndpointSet,
    ErrorResponse, HttpClientError, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl,
    RefreshToken, RequestTokenError, Scope, StandardDeviceAuthorizationResponse,
    TokenResponse as _, TokenUrl,
};
use reqwest::Client;
use serde_json::json;

use youtube_uploader_core::auth::token::TokenResponse;
use youtube_uploader_core::auth::UPLOAD_SCOPE;
use youtube_uploader_core::contract::{DeviceAuthorization, OAuthClient};
use youtube_uploader_core::credentials::ClientSecret;
use youtube_uploader_core::error::AuthError;

/// Auth URL, device authorization URL and token URL set; no introspection or
/// revocation.
type GoogleClient =
    BasicClient<EndpointSet, EndpointSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

type RequestError<T> = RequestTokenError<HttpClientError<reqwest::Error>, T>;

pub struct GoogleOAuthClient {
    http: Client,
    oauth: GoogleClient,
    manual_redirect_uri: String,
}

impl GoogleOAuthClient {
    pub fn new(secret: ClientSecret) -> Result<Self, AuthError> {
        let oauth = BasicClient::new(ClientId::new(secret.client_id.clone()))
            .set_client_secret(oauth2::ClientSecret::new(secret.client_secret.clone()))
            .set_auth_type(AuthType::RequestBody)
            .set_auth_uri(
                AuthUrl::new(secret.auth_uri.clone()).map_err(invalid(&secret.auth_uri))?,
            )
            .set_token_uri(
                TokenUrl::new(secret.token_uri.clone()).map_err(invalid(&secret.token_uri))?,
            )
            .set_device_authorization_url(
                DeviceAuthorizationUrl::new(secret.device_auth_uri.clone())
                    .map_err(invalid(&secret.device_auth_uri))?,
            );

        // Token endpoint redirects are never followed.
        let http = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AuthError::Http(e.to_string()))?;

        tracing::info!(
            client_id = %secret.client_id,
            token_uri = %secret.token_uri,
            "Initialized GoogleOAuthClient"
        );
        Ok(Self {
            http,
            oauth,
            manual_redirect_uri: secret.manual_redirect_uri().to_string(),
        })
    }
}

fn invalid(url: &str) -> impl FnOnce(oauth2::url::ParseError) -> AuthError + '_ {
    move |e| AuthError::InvalidEndpoint {
        url: url.to_string(),
        reason: e.to_string(),
    }
}

fn redirect_url(redirect_uri: &str) -> Result<RedirectUrl, AuthError> {
    RedirectUrl::new(redirect_uri.to_string()).map_err(invalid(redirect_uri))
}

/// Splits an `oauth2` failure into the server's error body, or an
/// [`AuthError`] for transport and parse failures.
fn server_response<T>(err: RequestError<T>) -> Result<T, AuthError>
where
    T: ErrorResponse + 'static,
{
    match err {
        RequestTokenError::ServerResponse(response) => Ok(response),
        RequestTokenError::Request(e) => {
            tracing::error!(error = %e, "OAuth request failed");
            Err(AuthError::Http(e.to_string()))
        }
        RequestTokenError::Parse(e, body) => {
            tracing::error!(error = %e, "OAuth endpoint reply did not parse");
            Err(AuthError::UnexpectedResponse(format!(
                "{e}: {}",
                String::from_utf8_lossy(&body).trim()
            )))
        }
        RequestTokenError::Other(message) => Err(AuthError::UnexpectedResponse(message)),
    }
}

fn endpoint_error(err: RequestError<BasicErrorResponse>) -> AuthError {
    match server_response(err) {
        Ok(response) => {
            tracing::debug!(error = %response.error(), "OAuth endpoint returned an error");
            AuthError::Endpoint {
                error: response.error().to_string(),
                description: response.error_description().cloned(),
            }
        }
        Err(e) => e,
    }
}

fn device_error(err: RequestError<DeviceCodeErrorResponse>) -> AuthError {
    let response = match server_response(err) {
        Ok(response) => response,
        Err(e) => return e,
    };
    match response.error() {
        DeviceCodeErrorResponseType::AccessDenied => AuthError::AuthorizationDenied(
            response
                .error_description()
                .cloned()
                .unwrap_or_else(|| "access_denied".to_string()),
        ),
        DeviceCodeErrorResponseType::ExpiredToken => AuthError::DeviceCodeExpired,
        other => AuthError::Endpoint {
            error: other.to_string(),
            description: response.error_description().cloned(),
        },
    }
}

fn token_response(token: &BasicTokenResponse) -> TokenResponse {
    let token_type = match token.token_type() {
        BasicTokenType::Bearer => "Bearer".to_string(),
        BasicTokenType::Mac => "MAC".to_string(),
        BasicTokenType::Extension(other) => other.clone(),
    };
    TokenResponse {
        access_token: token.access_token().secret().clone(),
        expires_in: token
            .expires_in()
            .map(|lifetime| i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX)),
        refresh_token: token.refresh_token().map(|t| t.secret().clone()),
        scope: token.scopes().map(|scopes| {
            scopes
                .iter()
                .map(|scope| scope.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        }),
        token_type: Some(token_type),
    }
}

fn upload_scope() -> Scope {
    Scope::new(UPLOAD_SCOPE.to_string())
}

#[async_trait]
impl OAuthClient for GoogleOAuthClient {
    fn authorization_url(
        &self,
        redirect_uri: &str,
        state: &CsrfToken,
        pkce_challenge: &PkceCodeChallenge,
    ) -> Result<String, AuthError> {
        let redirect = redirect_url(redirect_uri)?;
        let state = state.clone();
        let (url, _) = self
            .oauth
            .authorize_url(move || state)
            .add_scope(upload_scope())
            .set_pkce_challenge(pkce_challenge.clone())
            .set_redirect_uri(Cow::Owned(redirect))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url();
        Ok(url.to_string())
    }

    fn manual_redirect_uri(&self) -> String {
        self.manual_redirect_uri.clone()
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        pkce_verifier: Option<PkceCodeVerifier>,
    ) -> Result<TokenResponse, AuthError> {
        tracing::info!(%redirect_uri, "Exchanging authorization code");
        let redirect = redirect_url(redirect_uri)?;
        let mut request = self
            .oauth
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_redirect_uri(Cow::Owned(redirect));
        if let Some(verifier) = pkce_verifier {
            request = request.set_pkce_verifier(verifier);
        }
        let token = request
            .request_async(&self.http)
            .await
            .map_err(endpoint_error)?;
        Ok(token_response(&token))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        tracing::info!("Requesting refreshed access token");
        let refresh_token = RefreshToken::new(refresh_token.to_string());
        let token = self
            .oauth
            .exchange_refresh_token(&refresh_token)
            .request_async(&self.http)
            .await
            .map_err(endpoint_error)?;
        Ok(token_response(&token))
    }

    async fn request_device_code(&self) -> Result<DeviceAuthorization, AuthError> {
        tracing::info!("Requesting device code");
        let details: StandardDeviceAuthorizationResponse = self
            .oauth
            .exchange_device_code()
            .add_scope(upload_scope())
            .request_async(&self.http)
            .await
            .map_err(endpoint_error)?;
        Ok(DeviceAuthorization {
            device_code: details.device_code().secret().clone(),
            user_code: details.user_code().secret().clone(),
            verification_url: details.verification_uri().as_str().to_string(),
            expires_in: details.expires_in().as_secs(),
            interval: details.interval().as_secs(),
        })
    }

    async fn wait_for_device_token(
        &self,
        authorization: &DeviceAuthorization,
    ) -> Result<TokenResponse, AuthError> {
        let details: StandardDeviceAuthorizationResponse = serde_json::from_value(json!({
            "device_code": authorization.device_code,
            "user_code": authorization.user_code,
            "verification_uri": authorization.verification_url,
            "expires_in": authorization.expires_in,
            "interval": authorization.interval,
        }))
        .map_err(|e| AuthError::UnexpectedResponse(e.to_string()))?;

        let token = self
            .oauth
            .exchange_device_access_token(&details)
            .request_async(&self.http, tokio::time::sleep, None)
            .await
            .map_err(device_error)?;
        Ok(token_response(&token))
    }
}
