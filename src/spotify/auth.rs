use std::{sync::Arc, time::Duration};

use chrono::Utc;
use reqwest::{Client, Url};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::{
    config::Config,
    error::{Error, Result},
    server::start_api_server,
    types::{PkceToken, Token},
    utils, warning,
};

/// Longest time the `auth` command waits for the browser round trip.
const AUTH_TIMEOUT: Duration = Duration::from_secs(60);

/// Runs the OAuth 2.0 authorization-code flow with PKCE and returns the token.
///
/// The flow:
/// 1. **PKCE Setup**: generates a code verifier and its SHA256 challenge
/// 2. **Server Start**: launches the local callback server on `server_address`
/// 3. **Browser Launch**: opens the authorization URL (printed if that fails)
/// 4. **Callback Handling**: the server exchanges the returned code for a token
/// 5. **Wait**: polls the shared state until a token arrives or 60 seconds pass
///
/// Persisting the token is left to the caller.
///
/// # Errors
///
/// Returns [`Error::Auth`] when no token arrives within the timeout, and
/// [`Error::Config`] when the authorization URL cannot be built.
pub async fn authorize(config: &Config) -> Result<Token> {
    let code_verifier = utils::generate_code_verifier();
    let code_challenge = utils::generate_code_challenge(&code_verifier);

    let shared_state: Arc<Mutex<Option<PkceToken>>> = Arc::new(Mutex::new(Some(PkceToken {
        code_verifier,
        token: None,
    })));

    let server_state = Arc::clone(&shared_state);
    let server_config = config.clone();
    let server = tokio::spawn(async move { start_api_server(server_config, server_state).await });

    let auth_url = Url::parse_with_params(
        &config.auth_url,
        &[
            ("client_id", config.client_id.as_str()),
            ("response_type", "code"),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("code_challenge", code_challenge.as_str()),
            ("code_challenge_method", "S256"),
            ("scope", config.scope.as_str()),
        ],
    )
    .map_err(|e| Error::Config(format!("invalid SPOTIFY_AUTH_URL: {}", e)))?;

    if webbrowser::open(auth_url.as_str()).is_err() {
        warning!(
            "Failed to open browser. Please navigate to the following URL manually:\n{}",
            auth_url
        )
    }

    let token = wait_for_token(shared_state, AUTH_TIMEOUT).await;
    server.abort();

    token.ok_or_else(|| Error::Auth("authentication failed or timed out".to_string()))
}

/// Polls the shared state once a second until the callback stored a token.
async fn wait_for_token(
    shared_state: Arc<Mutex<Option<PkceToken>>>,
    max_wait: Duration,
) -> Option<Token> {
    let start = tokio::time::Instant::now();

    while start.elapsed() < max_wait {
        {
            let lock = shared_state.lock().await;
            if let Some(token) = lock.as_ref().and_then(|pkce| pkce.token.clone()) {
                return Some(token);
            }
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    None
}

/// Exchanges a refresh token for a fresh access token.
///
/// The client secret is sent when configured. Spotify may or may not rotate
/// the refresh token; when the response carries none, the old one is kept.
pub async fn refresh_token(config: &Config, refresh_token: &str) -> Result<Token> {
    let mut form = vec![
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
        ("client_id", config.client_id.as_str()),
    ];
    if let Some(secret) = config.client_secret.as_deref() {
        form.push(("client_secret", secret));
    }

    let json = post_token_form(config, &form).await?;
    token_from_json(&json, Some(refresh_token))
}

/// Exchanges the authorization code from the callback for a token.
pub async fn exchange_code_pkce(config: &Config, code: &str, verifier: &str) -> Result<Token> {
    let form = [
        ("grant_type", "authorization_code"),
        ("client_id", config.client_id.as_str()),
        ("code", code),
        ("code_verifier", verifier),
        ("redirect_uri", config.redirect_uri.as_str()),
    ];

    let json = post_token_form(config, &form).await?;
    token_from_json(&json, None)
}

async fn post_token_form(config: &Config, form: &[(&str, &str)]) -> Result<Value> {
    let url = config.token_url.as_str();
    let response = Client::new()
        .post(url)
        .form(form)
        .send()
        .await
        .map_err(|source| Error::Http {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    let json: Value = response.json().await.map_err(|source| Error::Http {
        url: url.to_string(),
        source,
    })?;

    if !status.is_success() {
        let reason = json["error_description"]
            .as_str()
            .or_else(|| json["error"].as_str())
            .unwrap_or("unknown error");
        return Err(Error::Auth(format!(
            "token endpoint returned {}: {}",
            status.as_u16(),
            reason
        )));
    }

    Ok(json)
}

/// Builds a [`Token`] from a token endpoint response.
///
/// `previous_refresh` is used when the response does not rotate the refresh
/// token.
pub fn token_from_json(json: &Value, previous_refresh: Option<&str>) -> Result<Token> {
    let access_token = json["access_token"]
        .as_str()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::Auth("token response has no access_token".to_string()))?;

    let refresh_token = json["refresh_token"]
        .as_str()
        .or(previous_refresh)
        .ok_or_else(|| Error::Auth("token response has no refresh_token".to_string()))?;

    Ok(Token {
        access_token: access_token.to_string(),
        refresh_token: refresh_token.to_string(),
        scope: json["scope"].as_str().unwrap_or_default().to_string(),
        expires_in: json["expires_in"].as_u64().unwrap_or(3600),
        obtained_at: Utc::now().timestamp() as u64,
    })
}
