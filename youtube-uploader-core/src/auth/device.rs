//! Device authorization grant (RFC 8628) for headless machines: show a code,
//! let the user approve it on another device, wait for the grant.

use tracing::info;

use super::token::TokenResponse;
use super::Prompt;
use crate::contract::OAuthClient;
use crate::error::AuthError;

pub async fn run<C>(client: &C, prompt: &dyn Prompt) -> Result<TokenResponse, AuthError>
where
    C: OAuthClient + ?Sized,
{
    let authorization = client.request_device_code().await?;
    prompt.show(&format!(
        "To authorize this application, visit:\n   {}\nand enter the code: {}",
        authorization.verification_url, authorization.user_code
    ));

    info!(
        interval_secs = authorization.interval,
        expires_in = authorization.expires_in,
        "Waiting for device authorization"
    );
    let token = client.wait_for_device_token(&authorization).await?;
    info!("Device authorization granted");
    Ok(token)
}
