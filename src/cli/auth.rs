use crate::{config::Config, error, info, management::TokenManager, spotify, success, warning};

pub async fn auth(config: &Config) {
    info!("Opening browser for Spotify authorization...");

    let token = match spotify::auth::authorize(config).await {
        Ok(token) => token,
        Err(e) => error!("Authorization failed: {}", e),
    };

    let manager = TokenManager::new(token, config.clone());
    if let Err(e) = manager.persist().await {
        warning!("Could not cache token at {}: {}", TokenManager::token_path().display(), e);
    }

    success!("Authorization successful.");
    info!(
        "Refresh token (set SPOTIFY_REFRESH_TOKEN to reuse it on another machine):\n{}",
        manager.current_token().refresh_token
    );
}
