use serde::{Deserialize, Serialize};
use serde_json::Value;
use tabled::Tabled;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: String,
    pub scope: String,
    pub expires_in: u64,
    pub obtained_at: u64,
}

/// State shared between the `auth` command and the callback handler.
#[derive(Debug, Clone)]
pub struct PkceToken {
    pub code_verifier: String,
    pub token: Option<Token>,
}

/// One page of a paginated collection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub items: Vec<Value>,
    pub next: Option<String>,
}

// Raw upstream shapes. Every field the normalizer reads is optional so that a
// missing or null value degrades to a null column instead of a failure.

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTotal {
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawOwner {
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPlaylist {
    pub id: Option<String>,
    pub href: Option<String>,
    pub name: Option<String>,
    pub owner: Option<RawOwner>,
    pub public: Option<bool>,
    pub collaborative: Option<bool>,
    pub tracks: Option<RawTotal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawNamed {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTrack {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub artists: Vec<RawNamed>,
    pub album: Option<RawNamed>,
}

impl RawTrack {
    pub fn first_artist(&self) -> Option<String> {
        self.artists.first().and_then(|a| a.name.clone())
    }

    pub fn album_name(&self) -> Option<String> {
        self.album.as_ref().and_then(|a| a.name.clone())
    }
}

/// Item of `/playlists/{id}/tracks`, with the owning playlist injected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPlaylistItem {
    pub track: Option<RawTrack>,
    pub playlist_id: Option<String>,
}

/// Item of `/me/tracks`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSavedItem {
    pub track: Option<RawTrack>,
    pub added_at: Option<String>,
}

/// Item of `/me/player/recently-played`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPlayHistory {
    pub track: Option<RawTrack>,
    pub played_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawArtist {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub genres: Vec<String>,
    pub popularity: Option<u32>,
    pub followers: Option<RawTotal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawUser {
    pub id: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub country: Option<String>,
    pub product: Option<String>,
    pub followers: Option<RawTotal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAudioFeature {
    pub id: Option<String>,
    pub danceability: Option<f64>,
    pub energy: Option<f64>,
    pub key: Option<i64>,
    pub loudness: Option<f64>,
    pub mode: Option<i64>,
    pub speechiness: Option<f64>,
    pub acousticness: Option<f64>,
    pub instrumentalness: Option<f64>,
    pub liveness: Option<f64>,
    pub valence: Option<f64>,
    pub tempo: Option<f64>,
    pub duration_ms: Option<i64>,
    pub time_signature: Option<i64>,
    pub uri: Option<String>,
    pub track_href: Option<String>,
    pub analysis_url: Option<String>,
}

/// Top artist or track, with `item_type` and `time_range` injected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTopItem {
    pub id: Option<String>,
    pub name: Option<String>,
    pub item_type: Option<String>,
    pub time_range: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Tabled)]
pub struct TableSummaryRow {
    pub table: String,
    pub fetched: usize,
    pub written: String,
}
