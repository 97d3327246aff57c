//! Configuration management for spotetl.
//!
//! Configuration comes from environment variables, optionally seeded from a
//! `.env` file in the local data directory. Values are read exactly once per
//! run into [`Config`] and handed to the pipeline explicitly; nothing below
//! the CLI layer reads the process environment.
//!
//! The lookup order is:
//! 1. Environment variables (highest priority)
//! 2. `.env` file in the local data directory
//! 3. Built-in defaults (where applicable)

use std::{collections::BTreeSet, env, fmt, path::PathBuf, str::FromStr, time::Duration};

use crate::error::{Error, Result};

pub const APP_DIR: &str = "spotetl";

pub const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:3000/callback";
pub const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:3000";
pub const DEFAULT_SCOPE: &str = "user-top-read user-read-private user-read-email playlist-read-private user-library-read user-read-recently-played user-follow-read";

/// Returns `<data_local_dir>/spotetl`, falling back to the working directory.
pub fn data_dir() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(APP_DIR);
    path
}

/// Loads environment variables from `<data_local_dir>/spotetl/.env`.
///
/// Creates the directory if it does not exist. A missing `.env` file is not
/// an error because every variable may also come from the process
/// environment; a file that exists but cannot be parsed is.
///
/// # Directory Structure
///
/// - Linux: `~/.local/share/spotetl/.env`
/// - macOS: `~/Library/Application Support/spotetl/.env`
/// - Windows: `%LOCALAPPDATA%/spotetl/.env`
pub async fn load_env() -> Result<()> {
    let dir = data_dir();
    async_fs::create_dir_all(&dir).await?;

    let path = dir.join(".env");
    if !path.is_file() {
        tracing::debug!(path = %path.display(), "no .env file, using process environment");
        return Ok(());
    }

    dotenv::from_path(&path)
        .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
    Ok(())
}

/// Credentials, endpoints and the database location.
#[derive(Debug, Clone)]
pub struct Config {
    pub client_id: String,
    pub client_secret: Option<String>,
    /// Seeds the token cache when no token has been stored yet.
    pub refresh_token: Option<String>,
    pub redirect_uri: String,
    pub scope: String,
    pub api_url: String,
    pub auth_url: String,
    pub token_url: String,
    pub server_address: String,
    pub database_url: String,
}

impl Config {
    /// Builds the configuration from the current environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `SPOTIFY_CLIENT_ID` is not set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or_default = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let client_id = var("SPOTIFY_CLIENT_ID")
            .ok_or_else(|| Error::Config("SPOTIFY_CLIENT_ID must be set".to_string()))?;

        let database_url = var("DATABASE_URL").unwrap_or_else(|| {
            format!("sqlite:{}", data_dir().join("spotetl.db").display())
        });

        Ok(Self {
            client_id,
            client_secret: var("SPOTIFY_CLIENT_SECRET"),
            refresh_token: var("SPOTIFY_REFRESH_TOKEN"),
            redirect_uri: or_default("SPOTIFY_REDIRECT_URI", DEFAULT_REDIRECT_URI),
            scope: or_default("SPOTIFY_SCOPE", DEFAULT_SCOPE),
            api_url: or_default("SPOTIFY_API_URL", DEFAULT_API_URL)
                .trim_end_matches('/')
                .to_string(),
            auth_url: or_default("SPOTIFY_AUTH_URL", DEFAULT_AUTH_URL),
            token_url: or_default("SPOTIFY_TOKEN_URL", DEFAULT_TOKEN_URL),
            server_address: or_default("SERVER_ADDRESS", DEFAULT_SERVER_ADDRESS),
            database_url,
        })
    }
}

/// One independently selectable upstream resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Resource {
    Profile,
    Playlists,
    PlaylistTracks,
    SavedTracks,
    RecentTracks,
    FollowedArtists,
    TopItems,
    AudioFeatures,
}

impl Resource {
    pub const ALL: [Resource; 8] = [
        Resource::Profile,
        Resource::Playlists,
        Resource::PlaylistTracks,
        Resource::SavedTracks,
        Resource::RecentTracks,
        Resource::FollowedArtists,
        Resource::TopItems,
        Resource::AudioFeatures,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Profile => "profile",
            Resource::Playlists => "playlists",
            Resource::PlaylistTracks => "playlist-tracks",
            Resource::SavedTracks => "saved-tracks",
            Resource::RecentTracks => "recent-tracks",
            Resource::FollowedArtists => "followed-artists",
            Resource::TopItems => "top-items",
            Resource::AudioFeatures => "audio-features",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Resource::ALL
            .into_iter()
            .find(|r| r.as_str() == wanted)
            .ok_or_else(|| {
                format!(
                    "unknown resource '{}', expected one of: {}",
                    s,
                    Resource::ALL.map(|r| r.as_str()).join(", ")
                )
            })
    }
}

/// Where the top-items fetches run relative to the other phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TopItemsPhase {
    /// Alongside the independent top-level fetches.
    #[default]
    WithIndependent,
    /// After all track data has been collected.
    Separate,
}

impl FromStr for TopItemsPhase {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "with-independent" | "independent" => Ok(TopItemsPhase::WithIndependent),
            "separate" => Ok(TopItemsPhase::Separate),
            other => Err(format!(
                "unknown top items phase '{}', expected with-independent or separate",
                other
            )),
        }
    }
}

/// How the loader treats an existing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    #[default]
    Append,
    Replace,
}

impl FromStr for WriteMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "append" => Ok(WriteMode::Append),
            "replace" => Ok(WriteMode::Replace),
            other => Err(format!("unknown write mode '{}', expected append or replace", other)),
        }
    }
}

/// Limits and resource selection for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Upper bound on simultaneously in-flight requests.
    pub max_concurrency: usize,
    /// Delay after every successful response, inside the concurrency slot.
    pub pacing: Duration,
    /// Re-issues allowed after 429 before giving up.
    pub max_retries: u32,
    /// Wait used when a 429 carries no `Retry-After`, doubled per attempt.
    pub default_retry_after: Duration,
    /// Server-directed waits above this abort the request.
    pub max_retry_after: Duration,
    pub request_timeout: Duration,
    pub page_limit: u32,
    pub feature_batch_size: usize,
    pub resources: BTreeSet<Resource>,
    pub top_items_phase: TopItemsPhase,
    pub write_mode: WriteMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            pacing: Duration::from_millis(100),
            max_retries: 5,
            default_retry_after: Duration::from_secs(1),
            max_retry_after: Duration::from_secs(120),
            request_timeout: Duration::from_secs(30),
            page_limit: 50,
            feature_batch_size: 100,
            resources: Resource::ALL.into_iter().collect(),
            top_items_phase: TopItemsPhase::default(),
            write_mode: WriteMode::default(),
        }
    }
}

impl PipelineConfig {
    pub fn wants(&self, resource: Resource) -> bool {
        self.resources.contains(&resource)
    }
}
