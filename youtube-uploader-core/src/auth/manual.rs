//! Manual flow: the consent URL is opened on any device and the resulting
//! code is pasted back into the terminal. Works over SSH without a loopback
//! listener and without device-flow support for the scope.

use oauth2::{CsrfToken, PkceCodeChallenge};
use reqwest::Url;
use tracing::info;

use super::token::TokenResponse;
use super::Prompt;
use crate::contract::OAuthClient;
use crate::error::AuthError;

/// Accepts either the bare code or the whole URL the browser was redirected to.
pub fn extract_code(input: &str, expected_state: &str) -> Result<String, AuthError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(AuthError::MissingCode);
    }

    let Ok(url) = Url::parse(input) else {
        return Ok(input.to_string());
    };

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match &*key {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => return Err(AuthError::AuthorizationDenied(value.into_owned())),
            _ => {}
        }
    }
    if let Some(state) = state {
        if state != expected_state {
            return Err(AuthError::StateMismatch);
        }
    }
    code.ok_or(AuthError::MissingCode)
}

pub async fn run<C>(client: &C, prompt: &dyn Prompt) -> Result<TokenResponse, AuthError>
where
    C: OAuthClient + ?Sized,
{
    let redirect_uri = client.manual_redirect_uri();
    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
    let state = CsrfToken::new_random();
    let url = client.authorization_url(&redirect_uri, &state, &pkce_challenge)?;

    prompt.show(&format!(
        "🔗 Please visit this URL on any device with internet access:\n   {url}\n\n\
         📋 After authorization you'll be redirected; copy the code (or the whole address) from there."
    ));
    let answer = prompt
        .read_line("   Enter the authorization code here: ")
        .map_err(AuthError::Prompt)?;
    let code = extract_code(&answer, state.secret())?;

    info!("Authorization code entered, exchanging for tokens");
    client
        .exchange_code(&code, &redirect_uri, Some(pkce_verifier))
        .await
}
