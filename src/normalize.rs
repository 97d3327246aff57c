//! Record Normalizer.
//!
//! Maps raw API items onto flat records with a fixed column set per table.
//! Each entity kind has a typed raw schema in [`crate::types`] whose fields
//! are all optional:
//!
//! - a missing or null nested value becomes a null column;
//! - a missing *required* reference drops the item: the `track` object for
//!   playlist, saved and recent tracks, the `id` for every other kind;
//! - an item that does not match its schema at all is dropped and logged.
//!
//! A track whose own `id` is null (a local file) is still recorded.

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::types::{
    RawArtist, RawAudioFeature, RawPlayHistory, RawPlaylist, RawPlaylistItem, RawSavedItem,
    RawTopItem, RawTrack, RawUser,
};

/// Destination tables, one per entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Table {
    UserProfile,
    Playlists,
    PlaylistTracks,
    SavedTracks,
    RecentTracks,
    FollowedArtists,
    TopItems,
    AudioFeatures,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::UserProfile => "user_profile",
            Table::Playlists => "playlists",
            Table::PlaylistTracks => "playlists_tracks",
            Table::SavedTracks => "saved_tracks",
            Table::RecentTracks => "recent_tracks",
            Table::FollowedArtists => "followed_artists",
            Table::TopItems => "top_items",
            Table::AudioFeatures => "audio_features",
        }
    }

    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Table::UserProfile => &["id", "display_name", "email", "country", "product", "followers"],
            Table::Playlists => &["id", "href", "name", "owner", "public", "collaborative", "tracks"],
            Table::PlaylistTracks => &["id", "name", "artist", "album", "playlist_id"],
            Table::SavedTracks => &["id", "name", "artist", "album", "added_at"],
            Table::RecentTracks => &["id", "name", "artist", "album", "played_at"],
            Table::FollowedArtists => &["id", "name", "genres", "popularity", "followers"],
            Table::TopItems => &["item_type", "time_range", "id", "name", "raw"],
            Table::AudioFeatures => &[
                "id",
                "danceability",
                "energy",
                "key",
                "loudness",
                "mode",
                "speechiness",
                "acousticness",
                "instrumentalness",
                "liveness",
                "valence",
                "tempo",
                "duration_ms",
                "time_signature",
                "uri",
                "track_href",
                "analysis_url",
            ],
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The kind of a raw item, which selects its extraction rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    UserProfile,
    Playlist,
    PlaylistTrack,
    SavedTrack,
    RecentTrack,
    FollowedArtist,
    TopItem,
    AudioFeature,
}

impl EntityKind {
    pub fn table(&self) -> Table {
        match self {
            EntityKind::UserProfile => Table::UserProfile,
            EntityKind::Playlist => Table::Playlists,
            EntityKind::PlaylistTrack => Table::PlaylistTracks,
            EntityKind::SavedTrack => Table::SavedTracks,
            EntityKind::RecentTrack => Table::RecentTracks,
            EntityKind::FollowedArtist => Table::FollowedArtists,
            EntityKind::TopItem => Table::TopItems,
            EntityKind::AudioFeature => Table::AudioFeatures,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserProfileRecord {
    pub id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub country: Option<String>,
    pub product: Option<String>,
    pub followers: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistRecord {
    pub id: String,
    pub href: Option<String>,
    pub name: Option<String>,
    pub owner: Option<String>,
    pub public: Option<bool>,
    pub collaborative: Option<bool>,
    pub tracks: Option<u64>,
}

/// Shared shape of playlist, saved and recent tracks.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
}

impl From<RawTrack> for TrackRecord {
    fn from(track: RawTrack) -> Self {
        Self {
            artist: track.first_artist(),
            album: track.album_name(),
            id: track.id,
            name: track.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistTrackRecord {
    pub track: TrackRecord,
    pub playlist_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SavedTrackRecord {
    pub track: TrackRecord,
    pub added_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecentTrackRecord {
    pub track: TrackRecord,
    pub played_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FollowedArtistRecord {
    pub id: String,
    pub name: Option<String>,
    pub genres: String,
    pub popularity: Option<u32>,
    pub followers: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopItemRecord {
    pub item_type: Option<String>,
    pub time_range: Option<String>,
    pub id: String,
    pub name: Option<String>,
    /// The untouched upstream item, serialized.
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioFeatureRecord {
    pub id: String,
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

/// A normalized row, tagged by entity kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    UserProfile(UserProfileRecord),
    Playlist(PlaylistRecord),
    PlaylistTrack(PlaylistTrackRecord),
    SavedTrack(SavedTrackRecord),
    RecentTrack(RecentTrackRecord),
    FollowedArtist(FollowedArtistRecord),
    TopItem(TopItemRecord),
    AudioFeature(AudioFeatureRecord),
}

impl Record {
    pub fn table(&self) -> Table {
        match self {
            Record::UserProfile(_) => Table::UserProfile,
            Record::Playlist(_) => Table::Playlists,
            Record::PlaylistTrack(_) => Table::PlaylistTracks,
            Record::SavedTrack(_) => Table::SavedTracks,
            Record::RecentTrack(_) => Table::RecentTracks,
            Record::FollowedArtist(_) => Table::FollowedArtists,
            Record::TopItem(_) => Table::TopItems,
            Record::AudioFeature(_) => Table::AudioFeatures,
        }
    }

    /// Column values in the order of [`Table::columns`], rendered as text.
    pub fn values(&self) -> Vec<Option<String>> {
        match self {
            Record::UserProfile(r) => vec![
                Some(r.id.clone()),
                r.display_name.clone(),
                r.email.clone(),
                r.country.clone(),
                r.product.clone(),
                text(r.followers),
            ],
            Record::Playlist(r) => vec![
                Some(r.id.clone()),
                r.href.clone(),
                r.name.clone(),
                r.owner.clone(),
                text(r.public),
                text(r.collaborative),
                text(r.tracks),
            ],
            Record::PlaylistTrack(r) => track_values(&r.track, &r.playlist_id),
            Record::SavedTrack(r) => track_values(&r.track, &r.added_at),
            Record::RecentTrack(r) => track_values(&r.track, &r.played_at),
            Record::FollowedArtist(r) => vec![
                Some(r.id.clone()),
                r.name.clone(),
                Some(r.genres.clone()),
                text(r.popularity),
                text(r.followers),
            ],
            Record::TopItem(r) => vec![
                r.item_type.clone(),
                r.time_range.clone(),
                Some(r.id.clone()),
                r.name.clone(),
                Some(r.raw.clone()),
            ],
            Record::AudioFeature(r) => vec![
                Some(r.id.clone()),
                text(r.danceability),
                text(r.energy),
                text(r.key),
                text(r.loudness),
                text(r.mode),
                text(r.speechiness),
                text(r.acousticness),
                text(r.instrumentalness),
                text(r.liveness),
                text(r.valence),
                text(r.tempo),
                text(r.duration_ms),
                text(r.time_signature),
                r.uri.clone(),
                r.track_href.clone(),
                r.analysis_url.clone(),
            ],
        }
    }
}

fn text<T: ToString>(value: Option<T>) -> Option<String> {
    value.map(|v| v.to_string())
}

fn track_values(track: &TrackRecord, extra: &Option<String>) -> Vec<Option<String>> {
    vec![
        track.id.clone(),
        track.name.clone(),
        track.artist.clone(),
        track.album.clone(),
        extra.clone(),
    ]
}

fn parse<T: DeserializeOwned>(raw: &Value, kind: EntityKind) -> Option<T> {
    match T::deserialize(raw) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::warn!(kind = ?kind, error = %e, "dropping item that does not match its schema");
            None
        }
    }
}

/// Normalizes one raw item, or returns `None` if it must be dropped.
pub fn normalize(raw: &Value, kind: EntityKind) -> Option<Record> {
    let record = match kind {
        EntityKind::UserProfile => {
            let user: RawUser = parse(raw, kind)?;
            Record::UserProfile(UserProfileRecord {
                id: user.id?,
                display_name: user.display_name,
                email: user.email,
                country: user.country,
                product: user.product,
                followers: user.followers.and_then(|f| f.total),
            })
        }
        EntityKind::Playlist => {
            let playlist: RawPlaylist = parse(raw, kind)?;
            Record::Playlist(PlaylistRecord {
                id: playlist.id?,
                href: playlist.href,
                name: playlist.name,
                owner: playlist.owner.and_then(|o| o.display_name),
                public: playlist.public,
                collaborative: playlist.collaborative,
                tracks: playlist.tracks.and_then(|t| t.total),
            })
        }
        EntityKind::PlaylistTrack => {
            let item: RawPlaylistItem = parse(raw, kind)?;
            Record::PlaylistTrack(PlaylistTrackRecord {
                track: item.track?.into(),
                playlist_id: item.playlist_id,
            })
        }
        EntityKind::SavedTrack => {
            let item: RawSavedItem = parse(raw, kind)?;
            Record::SavedTrack(SavedTrackRecord {
                track: item.track?.into(),
                added_at: item.added_at,
            })
        }
        EntityKind::RecentTrack => {
            let item: RawPlayHistory = parse(raw, kind)?;
            Record::RecentTrack(RecentTrackRecord {
                track: item.track?.into(),
                played_at: item.played_at,
            })
        }
        EntityKind::FollowedArtist => {
            let artist: RawArtist = parse(raw, kind)?;
            Record::FollowedArtist(FollowedArtistRecord {
                id: artist.id?,
                name: artist.name,
                genres: artist.genres.join(", "),
                popularity: artist.popularity,
                followers: artist.followers.and_then(|f| f.total),
            })
        }
        EntityKind::TopItem => {
            let item: RawTopItem = parse(raw, kind)?;
            Record::TopItem(TopItemRecord {
                item_type: item.item_type,
                time_range: item.time_range,
                id: item.id?,
                name: item.name,
                raw: raw.to_string(),
            })
        }
        EntityKind::AudioFeature => {
            let f: RawAudioFeature = parse(raw, kind)?;
            Record::AudioFeature(AudioFeatureRecord {
                id: f.id?,
                danceability: f.danceability,
                energy: f.energy,
                key: f.key,
                loudness: f.loudness,
                mode: f.mode,
                speechiness: f.speechiness,
                acousticness: f.acousticness,
                instrumentalness: f.instrumentalness,
                liveness: f.liveness,
                valence: f.valence,
                tempo: f.tempo,
                duration_ms: f.duration_ms,
                time_signature: f.time_signature,
                uri: f.uri,
                track_href: f.track_href,
                analysis_url: f.analysis_url,
            })
        }
    };

    Some(record)
}

/// Normalizes a collection, dropping the items [`normalize`] rejects.
pub fn normalize_all(items: &[Value], kind: EntityKind) -> Vec<Record> {
    items.iter().filter_map(|raw| normalize(raw, kind)).collect()
}
