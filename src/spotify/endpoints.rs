//! URL builders for the upstream resources read by the pipeline.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopItemKind {
    Artists,
    Tracks,
}

impl TopItemKind {
    pub const ALL: [TopItemKind; 2] = [TopItemKind::Artists, TopItemKind::Tracks];

    pub fn as_str(&self) -> &'static str {
        match self {
            TopItemKind::Artists => "artists",
            TopItemKind::Tracks => "tracks",
        }
    }
}

impl fmt::Display for TopItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    Short,
    Medium,
    Long,
}

impl TimeRange {
    pub const ALL: [TimeRange; 3] = [TimeRange::Short, TimeRange::Medium, TimeRange::Long];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::Short => "short_term",
            TimeRange::Medium => "medium_term",
            TimeRange::Long => "long_term",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds request URLs against one API base (e.g. `https://api.spotify.com/v1`).
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: String,
    limit: u32,
}

impl Endpoints {
    pub fn new(base: &str, limit: u32) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            limit: limit.clamp(1, 50),
        }
    }

    pub fn profile(&self) -> String {
        format!("{uri}/me", uri = self.base)
    }

    pub fn playlists(&self) -> String {
        format!("{uri}/me/playlists?limit={limit}", uri = self.base, limit = self.limit)
    }

    pub fn playlist_tracks(&self, playlist_id: &str) -> String {
        format!(
            "{uri}/playlists/{id}/tracks?limit={limit}",
            uri = self.base,
            id = playlist_id,
            limit = self.limit
        )
    }

    pub fn saved_tracks(&self) -> String {
        format!("{uri}/me/tracks?limit={limit}", uri = self.base, limit = self.limit)
    }

    pub fn recently_played(&self) -> String {
        format!(
            "{uri}/me/player/recently-played?limit={limit}",
            uri = self.base,
            limit = self.limit
        )
    }

    pub fn followed_artists(&self) -> String {
        format!(
            "{uri}/me/following?type=artist&limit={limit}",
            uri = self.base,
            limit = self.limit
        )
    }

    pub fn top_items(&self, kind: TopItemKind, range: TimeRange) -> String {
        format!(
            "{uri}/me/top/{kind}?time_range={range}&limit={limit}",
            uri = self.base,
            kind = kind,
            range = range,
            limit = self.limit
        )
    }

    pub fn audio_features(&self, ids: &[String]) -> String {
        format!("{uri}/audio-features?ids={ids}", uri = self.base, ids = ids.join(","))
    }
}
