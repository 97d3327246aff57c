use std::path::PathBuf;

use chrono::Utc;

use crate::{
    config::{self, Config},
    error::{Error, Result},
    spotify,
    types::Token,
};

/// Seconds before expiry at which a token is already treated as expired.
const EXPIRY_MARGIN_SECS: u64 = 240;

/// Owns the cached OAuth token and keeps it fresh.
pub struct TokenManager {
    token: Token,
    config: Config,
    path: PathBuf,
}

impl TokenManager {
    pub fn new(token: Token, config: Config) -> Self {
        Self {
            token,
            config,
            path: Self::token_path(),
        }
    }

    /// Stores the token somewhere other than the data directory.
    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Loads the cached token, or bootstraps one from `SPOTIFY_REFRESH_TOKEN`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] when there is neither a cached token nor a
    /// configured refresh token, or when bootstrapping fails.
    pub async fn load(config: &Config) -> Result<Self> {
        let path = Self::token_path();
        match async_fs::read_to_string(&path).await {
            Ok(content) => {
                let token: Token = serde_json::from_str(&content)?;
                Ok(Self {
                    token,
                    config: config.clone(),
                    path,
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let refresh = config.refresh_token.as_deref().ok_or_else(|| {
                    Error::Auth(
                        "no cached token and SPOTIFY_REFRESH_TOKEN is not set, run `spotetl auth`"
                            .to_string(),
                    )
                })?;

                tracing::info!("no cached token, bootstrapping from SPOTIFY_REFRESH_TOKEN");
                let token = spotify::auth::refresh_token(config, refresh).await?;
                let manager = Self::new(token, config.clone());
                manager.persist().await?;
                Ok(manager)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            async_fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(&self.token)?;
        async_fs::write(&self.path, json).await?;
        Ok(())
    }

    /// Returns an access token that is valid for at least a few more minutes,
    /// refreshing and persisting it first if necessary.
    pub async fn get_valid_token(&mut self) -> Result<String> {
        if self.is_expired() {
            tracing::debug!("access token expired, refreshing");
            self.token = spotify::auth::refresh_token(&self.config, &self.token.refresh_token).await?;
            if let Err(e) = self.persist().await {
                tracing::warn!(error = %e, "cannot persist refreshed token");
            }
        }

        Ok(self.token.access_token.clone())
    }

    pub fn is_expired(&self) -> bool {
        let now = Utc::now().timestamp() as u64;
        now + EXPIRY_MARGIN_SECS >= self.token.obtained_at + self.token.expires_in
    }

    pub fn current_token(&self) -> &Token {
        &self.token
    }

    pub fn token_path() -> PathBuf {
        let mut path = config::data_dir();
        path.push("cache/token.json");
        path
    }
}
