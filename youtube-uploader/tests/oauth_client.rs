use oauth2::{CsrfToken, PkceCodeChallenge, PkceCodeVerifier};
use reqwest::Url;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use youtube_uploader::oauth::GoogleOAuthClient;
use youtube_uploader_core::contract::{DeviceAuthorization, OAuthClient};
use youtube_uploader_core::credentials::ClientSecret;
use youtube_uploader_core::error::AuthError;

fn secret_for(server: &MockServer) -> ClientSecret {
    ClientSecret {
        client_id: "client-123.apps.googleusercontent.com".to_string(),
        client_secret: "shh".to_string(),
        auth_uri: format!("{}/o/oauth2/auth", server.uri()),
        token_uri: format!("{}/token", server.uri()),
        device_auth_uri: format!("{}/device/code", server.uri()),
        redirect_uris: vec!["http://localhost".to_string()],
    }
}

#[tokio::test]
async fn authorization_url_carries_pkce_and_offline_access() {
    let server = MockServer::start().await;
    let client = GoogleOAuthClient::new(secret_for(&server)).unwrap();

    // RFC 7636 appendix B.
    let verifier =
        PkceCodeVerifier::new("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".to_string());
    let challenge = PkceCodeChallenge::from_code_verifier_sha256(&verifier);
    let state = CsrfToken::new("state-xyz".to_string());

    let url = client
        .authorization_url("http://127.0.0.1:8765/", &state, &challenge)
        .expect("valid url");
    let url = Url::parse(&url).expect("valid url");
    let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

    assert_eq!(url.path(), "/o/oauth2/auth");
    assert_eq!(pairs["client_id"], "client-123.apps.googleusercontent.com");
    assert_eq!(pairs["redirect_uri"], "http://127.0.0.1:8765/");
    assert_eq!(pairs["response_type"], "code");
    assert_eq!(
        pairs["scope"],
        "https://www.googleapis.com/auth/youtube.upload"
    );
    assert_eq!(pairs["state"], "state-xyz");
    assert_eq!(
        pairs["code_challenge"],
        "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
    );
    assert_eq!(pairs["code_challenge_method"], "S256");
    assert_eq!(pairs["access_type"], "offline");
    assert_eq!(pairs["prompt"], "consent");
    assert_eq!(client.manual_redirect_uri(), "http://localhost");
}

#[tokio::test]
async fn exchange_code_posts_form_with_verifier() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=4%2F0AbCd"))
        .and(body_string_contains("code_verifier=verifier-1"))
        .and(body_string_contains("client_secret=shh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.fresh",
            "expires_in": 3599,
            "refresh_token": "1//refresh",
            "scope": "https://www.googleapis.com/auth/youtube.upload",
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = GoogleOAuthClient::new(secret_for(&server)).unwrap();
    let token = client
        .exchange_code(
            "4/0AbCd",
            "http://localhost",
            Some(PkceCodeVerifier::new("verifier-1".to_string())),
        )
        .await
        .expect("exchange should succeed");

    assert_eq!(token.access_token, "ya29.fresh");
    assert_eq!(token.refresh_token.as_deref(), Some("1//refresh"));
    assert_eq!(token.expires_in, Some(3599));
}

#[tokio::test]
async fn refresh_maps_invalid_grant_to_endpoint_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Token has been expired or revoked."
        })))
        .mount(&server)
        .await;

    let client = GoogleOAuthClient::new(secret_for(&server)).unwrap();
    let err = client.refresh("1//revoked").await.unwrap_err();

    assert!(err.is_invalid_grant());
    assert!(err.to_string().contains("Token has been expired or revoked."));
}

#[tokio::test]
async fn non_json_error_is_unexpected_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let client = GoogleOAuthClient::new(secret_for(&server)).unwrap();
    let err = client.refresh("1//r").await.unwrap_err();
    assert!(matches!(err, AuthError::UnexpectedResponse(ref m) if m.contains("Bad Gateway")));
}

fn device_authorization(device_code: &str) -> DeviceAuthorization {
    DeviceAuthorization {
        device_code: device_code.to_string(),
        user_code: "GQVQ-JKEC".to_string(),
        verification_url: "https://www.google.com/device".to_string(),
        expires_in: 60,
        interval: 1,
    }
}

#[tokio::test]
async fn device_code_request_accepts_google_field_names() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/device/code"))
        .and(body_string_contains("client_id=client-123"))
        .and(body_string_contains("youtube.upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device_code": "dev-abc",
            "user_code": "GQVQ-JKEC",
            "verification_url": "https://www.google.com/device",
            "expires_in": 1800,
            "interval": 5
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = GoogleOAuthClient::new(secret_for(&server)).unwrap();
    let device = client.request_device_code().await.expect("device code");

    assert_eq!(device.device_code, "dev-abc");
    assert_eq!(device.user_code, "GQVQ-JKEC");
    assert_eq!(device.verification_url, "https://www.google.com/device");
    assert_eq!(device.expires_in, 1800);
    assert_eq!(device.interval, 5);
}

#[tokio::test]
async fn device_token_is_polled_until_granted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("device_code=dev-abc"))
        .respond_with(
            ResponseTemplate::new(428).set_body_json(json!({"error": "authorization_pending"})),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("device_code=dev-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.device",
            "expires_in": 3599,
            "refresh_token": "1//dev",
            "token_type": "Bearer"
        })))
        .with_priority(2)
        .mount(&server)
        .await;

    let client = GoogleOAuthClient::new(secret_for(&server)).unwrap();
    let token = client
        .wait_for_device_token(&device_authorization("dev-abc"))
        .await
        .expect("device token");

    assert_eq!(token.access_token, "ya29.device");
    assert_eq!(token.refresh_token.as_deref(), Some("1//dev"));
    let polls = server.received_requests().await.unwrap_or_default();
    assert_eq!(polls.len(), 2);
}

#[tokio::test]
async fn device_denial_and_expiry_end_the_wait() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("device_code=denied-code"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": "access_denied",
            "error_description": "Forbidden"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("device_code=expired-code"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "expired_token"})))
        .mount(&server)
        .await;

    let client = GoogleOAuthClient::new(secret_for(&server)).unwrap();

    assert!(matches!(
        client.wait_for_device_token(&device_authorization("denied-code")).await,
        Err(AuthError::AuthorizationDenied(ref d)) if d == "Forbidden"
    ));
    assert!(matches!(
        client.wait_for_device_token(&device_authorization("expired-code")).await,
        Err(AuthError::DeviceCodeExpired)
    ));
}

#[tokio::test]
async fn malformed_endpoint_url_is_rejected() {
    let server = MockServer::start().await;
    let mut secret = secret_for(&server);
    secret.token_uri = "not a url".to_string();
    assert!(matches!(
        GoogleOAuthClient::new(secret),
        Err(AuthError::InvalidEndpoint { ref url, .. }) if url == "not a url"
    ));
}
