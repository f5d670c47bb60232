//! # auth: obtaining a user-scoped access token for the upload
//!
//! [`authenticate`] is the single entrypoint. It looks at the cached token,
//! decides whether it can be used as-is, refreshed, or whether the user has to
//! go through one of the interactive flows, and writes the result back to the
//! cache.
//!
//! Interactive flows:
//! - [`AuthMode::Browser`]: authorization code + PKCE with a loopback redirect
//!   to a listener on `127.0.0.1` (see [`browser`]).
//! - [`AuthMode::Device`]: the device authorization grant for machines without
//!   a browser (see [`device`]).
//! - [`AuthMode::Manual`]: the user opens the consent URL anywhere and pastes
//!   the code back into the terminal (see [`manual`]).
//!
//! Terminal I/O goes through the [`Prompt`] trait so the flows stay testable.

pub mod browser;
pub mod device;
pub mod manual;
pub mod token;

use std::io;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::contract::OAuthClient;
use crate::error::AuthError;
use token::{StoredToken, TokenCache, TokenResponse};

/// The only scope the tool asks for.
pub const UPLOAD_SCOPE: &str = "https://www.googleapis.com/auth/youtube.upload";

/// Which interactive flow to run when no usable token is cached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    Browser,
    Device,
    Manual,
}

impl std::str::FromStr for AuthMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "browser" | "local" => Ok(AuthMode::Browser),
            "device" => Ok(AuthMode::Device),
            "manual" | "console" => Ok(AuthMode::Manual),
            other => Err(format!(
                "unknown auth mode '{other}', expected browser, device or manual"
            )),
        }
    }
}

/// What to do with the cached token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenAction {
    UseCached,
    Refresh,
    Authorize,
}

pub fn decide(cached: Option<&StoredToken>, now: DateTime<Utc>) -> TokenAction {
    match cached {
        Some(token) if token.is_valid(now) => TokenAction::UseCached,
        Some(token)
            if token.is_expired(now) && token.can_refresh() && token.has_scope(UPLOAD_SCOPE) =>
        {
            TokenAction::Refresh
        }
        _ => TokenAction::Authorize,
    }
}

/// Terminal interaction needed by the interactive flows.
pub trait Prompt: Send + Sync {
    /// Shows a message to the user.
    fn show(&self, message: &str);

    /// Asks a question and returns the answer without the line ending.
    fn read_line(&self, question: &str) -> io::Result<String>;

    /// Tries to open `url` in a browser. Returns false when that was not
    /// possible; the URL has been shown either way.
    fn open_browser(&self, url: &str) -> bool;
}

/// Returns a usable token: cached, refreshed, or freshly authorized. Any new
/// token is written back to `cache`.
pub async fn authenticate<C>(
    client: &C,
    cache: &TokenCache,
    mode: AuthMode,
    prompt: &dyn Prompt,
) -> Result<StoredToken, AuthError>
where
    C: OAuthClient + ?Sized,
{
    let cached = cache.load()?;
    let now = Utc::now();
    let action = decide(cached.as_ref(), now);
    info!(?action, ?mode, "Resolved credential action");

    let token = match (action, cached) {
        (TokenAction::UseCached, Some(token)) => return Ok(token),
        (TokenAction::Refresh, Some(token)) => match refresh(client, &token).await {
            Ok(fresh) => fresh,
            Err(e) if e.is_invalid_grant() => {
                warn!(error = %e, "Refresh token rejected, starting a new authorization");
                authorize(client, mode, prompt).await?
            }
            Err(e) => return Err(e),
        },
        _ => authorize(client, mode, prompt).await?,
    };

    cache.save(&token)?;
    Ok(token)
}

async fn refresh<C>(client: &C, token: &StoredToken) -> Result<StoredToken, AuthError>
where
    C: OAuthClient + ?Sized,
{
    let refresh_token = token.refresh_token.clone().unwrap_or_default();
    info!("Refreshing expired access token");
    let response = client.refresh(&refresh_token).await?;
    StoredToken::from_response(response, Utc::now(), Some(refresh_token))
}

async fn authorize<C>(
    client: &C,
    mode: AuthMode,
    prompt: &dyn Prompt,
) -> Result<StoredToken, AuthError>
where
    C: OAuthClient + ?Sized,
{
    let response: TokenResponse = match mode {
        AuthMode::Browser => browser::run(client, prompt).await?,
        AuthMode::Device => device::run(client, prompt).await?,
        AuthMode::Manual => manual::run(client, prompt).await?,
    };
    info!(?mode, "Authorization completed");
    StoredToken::from_response(response, Utc::now(), None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn token(expires_in: i64, refresh: Option<&str>) -> StoredToken {
        StoredToken {
            access_token: "ya29.a".into(),
            refresh_token: refresh.map(str::to_string),
            token_type: "Bearer".into(),
            scopes: vec![UPLOAD_SCOPE.into()],
            expires_at: Some(now() + Duration::seconds(expires_in)),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn decision_table() {
        assert_eq!(decide(None, now()), TokenAction::Authorize);
        assert_eq!(
            decide(Some(&token(3600, None)), now()),
            TokenAction::UseCached
        );
        assert_eq!(
            decide(Some(&token(-10, Some("1//r"))), now()),
            TokenAction::Refresh
        );
        assert_eq!(
            decide(Some(&token(-10, None)), now()),
            TokenAction::Authorize
        );

        let mut wrong_scope = token(-10, Some("1//r"));
        wrong_scope.scopes = vec!["openid".into()];
        assert_eq!(decide(Some(&wrong_scope), now()), TokenAction::Authorize);
    }

    #[test]
    fn auth_mode_parses_aliases() {
        assert_eq!("device".parse::<AuthMode>(), Ok(AuthMode::Device));
        assert_eq!("Console".parse::<AuthMode>(), Ok(AuthMode::Manual));
        assert_eq!("local".parse::<AuthMode>(), Ok(AuthMode::Browser));
        assert!("carrier-pigeon".parse::<AuthMode>().is_err());
    }
}
