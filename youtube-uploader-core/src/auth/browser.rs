//! Local-browser flow: authorization code with PKCE, redirected to a
//! short-lived axum server on the loopback interface.

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use oauth2::{CsrfToken, PkceCodeChallenge};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::token::TokenResponse;
use super::Prompt;
use crate::contract::OAuthClient;
use crate::error::AuthError;

/// How long to wait for the user to finish in the browser.
const REDIRECT_TIMEOUT: Duration = Duration::from_secs(300);

const SUCCESS_PAGE: &str = "<html><body><h3>Authentication complete.</h3>\
<p>You may close this window and return to the terminal.</p></body></html>";
const FAILURE_PAGE: &str = "<html><body><h3>Authentication failed.</h3>\
<p>Return to the terminal for details.</p></body></html>";

/// Query parameters of the redirect back from the consent page.
#[derive(Debug, Default, PartialEq, Eq, Deserialize)]
pub struct RedirectParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

impl RedirectParams {
    fn is_oauth_reply(&self) -> bool {
        self.code.is_some() || self.error.is_some()
    }
}

struct RedirectState {
    expected_state: String,
    reply: Mutex<Option<oneshot::Sender<Result<String, AuthError>>>>,
}

/// A listener bound to `127.0.0.1` on an ephemeral port.
pub struct LoopbackReceiver {
    listener: TcpListener,
    redirect_uri: String,
}

impl LoopbackReceiver {
    pub async fn bind() -> Result<Self, AuthError> {
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .map_err(AuthError::Loopback)?;
        let port = listener.local_addr().map_err(AuthError::Loopback)?.port();
        let redirect_uri = format!("http://127.0.0.1:{port}/");
        debug!(%redirect_uri, "Loopback listener bound");
        Ok(Self {
            listener,
            redirect_uri,
        })
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Serves the redirect target until one request carries an OAuth reply,
    /// and returns its code. Connections are handled concurrently; other paths
    /// (favicon and the like) get a 404.
    pub async fn receive(self, expected_state: &str) -> Result<String, AuthError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let state = Arc::new(RedirectState {
            expected_state: expected_state.to_string(),
            reply: Mutex::new(Some(reply_tx)),
        });
        let app = Router::new()
            .route("/", get(handle_redirect))
            .with_state(state);

        let server = axum::serve(self.listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });
        // Detached: graceful shutdown lets the reply page reach the browser.
        tokio::spawn(async move {
            if let Err(e) = server.await {
                warn!(error = %e, "Loopback server stopped with an error");
            }
        });

        let outcome = reply_rx.await.map_err(|_| {
            AuthError::Loopback(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "loopback server stopped before the redirect arrived",
            ))
        });
        let _ = shutdown_tx.send(());
        outcome?
    }
}

async fn handle_redirect(
    State(state): State<Arc<RedirectState>>,
    Query(params): Query<RedirectParams>,
) -> (StatusCode, Html<&'static str>) {
    if !params.is_oauth_reply() {
        return (StatusCode::NOT_FOUND, Html(""));
    }

    let outcome = check_redirect(params, &state.expected_state);
    let page = if outcome.is_ok() {
        SUCCESS_PAGE
    } else {
        FAILURE_PAGE
    };
    match state.reply.lock().ok().and_then(|mut reply| reply.take()) {
        Some(reply) => {
            let _ = reply.send(outcome);
        }
        None => debug!("Ignoring a repeated redirect"),
    }
    (StatusCode::OK, Html(page))
}

fn check_redirect(params: RedirectParams, expected_state: &str) -> Result<String, AuthError> {
    if let Some(error) = params.error {
        return Err(AuthError::AuthorizationDenied(error));
    }
    if params.state.as_deref() != Some(expected_state) {
        return Err(AuthError::StateMismatch);
    }
    params.code.ok_or(AuthError::MissingCode)
}

/// Runs the whole browser flow and exchanges the code for tokens.
pub async fn run<C>(client: &C, prompt: &dyn Prompt) -> Result<TokenResponse, AuthError>
where
    C: OAuthClient + ?Sized,
{
    let receiver = LoopbackReceiver::bind().await?;
    let redirect_uri = receiver.redirect_uri().to_string();
    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
    let state = CsrfToken::new_random();
    let url = client.authorization_url(&redirect_uri, &state, &pkce_challenge)?;

    prompt.show(&format!(
        "Please visit this URL to authorize this application:\n   {url}"
    ));
    if !prompt.open_browser(&url) {
        info!("Could not open a browser automatically; waiting for the URL to be visited");
    }

    let code = tokio::time::timeout(REDIRECT_TIMEOUT, receiver.receive(state.secret()))
        .await
        .map_err(|_| {
            AuthError::Loopback(io::Error::new(
                io::ErrorKind::TimedOut,
                "no redirect received within 5 minutes",
            ))
        })??;

    info!("Authorization code received, exchanging for tokens");
    client
        .exchange_code(&code, &redirect_uri, Some(pkce_verifier))
        .await
}
