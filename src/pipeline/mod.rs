//! # Fan-Out Orchestrator
//!
//! Drives one extraction run against a [`RequestGate`] built for that run:
//!
//! ```text
//! Phase 1  profile ─┬─ playlists ─┬─ recent tracks ─┬─ followed artists ─┬─ top items*
//!                   │             │                 │                    │
//!                   └─────────────┴── join ─────────┴────────────────────┘
//!                                  │ playlist ids
//! Phase 2+3         per-playlist tracks (fan-out)  ║  saved tracks
//!                                  │
//! Phase 3b          top items* (when configured as a separate phase)
//!                                  │
//! Phase 4           TrackIdSet (playlist ∪ saved) → audio feature batches
//!                                  │
//!                   normalize every collection → Tables
//! ```
//!
//! All fetches are futures joined on the calling task; concurrency comes from
//! interleaving at I/O points, bounded by the gate.
//!
//! ## Failure policy
//!
//! - Playlists, saved tracks, recent tracks and followed artists are fatal:
//!   the run returns the error and produces no tables.
//! - One playlist's tracks, one top-items range, one feature batch or the user
//!   profile failing is logged and contributes nothing.
//! - Cancellation always aborts the run.
//!
//! Each run owns a child of the caller's [`CancellationToken`]. The first
//! fatal failure cancels it, so sibling fetches still in flight stop at their
//! next wait instead of running to completion.

mod ids;
mod tables;

use std::{future::Future, sync::Arc, time::Instant};

use futures::future::join_all;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

pub use ids::TrackIdSet;
pub use tables::Tables;

use crate::{
    config::{PipelineConfig, Resource, TopItemsPhase},
    error::{Error, Result},
    normalize::{EntityKind, normalize_all},
    spotify::{
        endpoints::{Endpoints, TimeRange, TopItemKind},
        features::fetch_features,
        gate::RequestGate,
        paginate::Paginator,
        transport::Transport,
    },
};

pub struct Pipeline {
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
    config: PipelineConfig,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(
        transport: Arc<dyn Transport>,
        api_url: &str,
        config: PipelineConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            endpoints: Endpoints::new(api_url, config.page_limit),
            config,
            cancel,
        }
    }

    /// Runs every selected fetch and returns the normalized tables.
    pub async fn run(&self, token: &str) -> Result<Tables> {
        let started = Instant::now();
        let cfg = &self.config;
        let abort = self.cancel.child_token();
        let gate = RequestGate::from_config(Arc::clone(&self.transport), cfg, abort.clone());
        let paginator = Paginator::new(&gate);

        let top_items_with_independent =
            cfg.wants(Resource::TopItems) && cfg.top_items_phase == TopItemsPhase::WithIndependent;
        // playlist ids are needed for the track fan-out even when the
        // playlists table itself is not wanted
        let fetch_playlists = cfg.wants(Resource::Playlists) || cfg.wants(Resource::PlaylistTracks);

        let playlists_url = self.endpoints.playlists();
        let recent_url = self.endpoints.recently_played();
        let followed_url = self.endpoints.followed_artists();
        let saved_url = self.endpoints.saved_tracks();
        let followed_paginator = paginator.with_envelope("artists");

        tracing::info!(
            max_concurrency = gate.max_concurrency(),
            "phase 1: independent fetches"
        );
        let (profile, playlists, recent, followed, mut top_items) = tokio::join!(
            self.fetch_profile(&gate, token),
            fatal(
                &abort,
                Resource::Playlists,
                when(fetch_playlists, paginator.fetch_all(&playlists_url, token))
            ),
            fatal(
                &abort,
                Resource::RecentTracks,
                when(cfg.wants(Resource::RecentTracks), async {
                    Ok::<_, Error>(paginator.fetch_page(&recent_url, token).await?.items)
                })
            ),
            fatal(
                &abort,
                Resource::FollowedArtists,
                when(
                    cfg.wants(Resource::FollowedArtists),
                    followed_paginator.fetch_all(&followed_url, token)
                )
            ),
            async {
                if top_items_with_independent {
                    self.fetch_top_items(&gate, token).await
                } else {
                    Vec::new()
                }
            },
        );
        let (playlists, recent, followed) = match (playlists, recent, followed) {
            (Ok(playlists), Ok(recent), Ok(followed)) => (playlists, recent, followed),
            (playlists, recent, followed) => {
                return Err(root_cause([playlists.err(), recent.err(), followed.err()]));
            }
        };
        check_cancelled(&gate)?;

        let playlist_ids: Vec<String> = playlists
            .iter()
            .flatten()
            .filter_map(|p| p["id"].as_str())
            .map(str::to_string)
            .collect();

        tracing::info!(playlists = playlist_ids.len(), "phase 2: playlist tracks and saved tracks");
        let (playlist_tracks, saved) = tokio::join!(
            async {
                if cfg.wants(Resource::PlaylistTracks) {
                    Some(self.fetch_playlist_tracks(&gate, &playlist_ids, token).await)
                } else {
                    None
                }
            },
            fatal(
                &abort,
                Resource::SavedTracks,
                when(cfg.wants(Resource::SavedTracks), paginator.fetch_all(&saved_url, token))
            ),
        );
        let saved = saved?;
        check_cancelled(&gate)?;

        if cfg.wants(Resource::TopItems) && cfg.top_items_phase == TopItemsPhase::Separate {
            tracing::info!("phase 3: top items");
            top_items = self.fetch_top_items(&gate, token).await;
            check_cancelled(&gate)?;
        }

        let mut features = None;
        if cfg.wants(Resource::AudioFeatures) {
            let mut track_ids = TrackIdSet::new();
            track_ids.extend_from_items(playlist_tracks.iter().flatten());
            track_ids.extend_from_items(saved.iter().flatten());

            tracing::info!(track_ids = track_ids.len(), "phase 4: audio features");
            features = Some(
                fetch_features(
                    &gate,
                    &self.endpoints,
                    token,
                    track_ids.as_slice(),
                    cfg.feature_batch_size,
                )
                .await,
            );
            check_cancelled(&gate)?;
        }

        let mut tables = Tables::new();
        if cfg.wants(Resource::Profile) {
            let profile: Vec<Value> = profile.into_iter().collect();
            tables.insert_normalized(&profile, EntityKind::UserProfile);
        }
        if cfg.wants(Resource::Playlists) {
            tables.insert_normalized(playlists.as_deref().unwrap_or_default(), EntityKind::Playlist);
        }
        if let Some(items) = &playlist_tracks {
            tables.insert_normalized(items, EntityKind::PlaylistTrack);
        }
        if let Some(items) = &saved {
            tables.insert_normalized(items, EntityKind::SavedTrack);
        }
        if let Some(items) = &recent {
            tables.insert_normalized(items, EntityKind::RecentTrack);
        }
        if let Some(items) = &followed {
            tables.insert_normalized(items, EntityKind::FollowedArtist);
        }
        if cfg.wants(Resource::TopItems) {
            tables.insert_normalized(&top_items, EntityKind::TopItem);
        }
        if let Some(items) = &features {
            tables.insert_normalized(items, EntityKind::AudioFeature);
        }

        tracing::info!(
            tables = tables.len(),
            rows = tables.total_rows(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "extraction finished"
        );
        Ok(tables)
    }

    /// `/me`, treated as optional: a failure is logged and yields nothing.
    async fn fetch_profile(&self, gate: &RequestGate, token: &str) -> Option<Value> {
        if !self.config.wants(Resource::Profile) {
            return None;
        }

        match gate.request(&self.endpoints.profile(), token).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                skipped("user profile", &e);
                None
            }
        }
    }

    /// One paginated fetch per playlist, all under the shared gate.
    ///
    /// Each item gets the owning `playlist_id` injected. A playlist whose
    /// fetch fails contributes no items and does not affect the others.
    async fn fetch_playlist_tracks(
        &self,
        gate: &RequestGate,
        playlist_ids: &[String],
        token: &str,
    ) -> Vec<Value> {
        let paginator = Paginator::new(gate);

        let fetches = playlist_ids.iter().map(|playlist_id| async move {
            let url = self.endpoints.playlist_tracks(playlist_id);
            match paginator.fetch_all(&url, token).await {
                Ok(items) => items
                    .into_iter()
                    .map(|item| with_field(item, "playlist_id", playlist_id))
                    .collect(),
                Err(e) => {
                    skipped(&format!("playlist {}", playlist_id), &e);
                    Vec::new()
                }
            }
        });

        join_all(fetches).await.into_iter().flatten().collect()
    }

    /// Top artists and tracks for every time range, tagged with both.
    async fn fetch_top_items(&self, gate: &RequestGate, token: &str) -> Vec<Value> {
        let paginator = Paginator::new(gate);

        let combos = TopItemKind::ALL
            .into_iter()
            .flat_map(|kind| TimeRange::ALL.into_iter().map(move |range| (kind, range)));

        let fetches = combos.map(|(kind, range)| async move {
            let url = self.endpoints.top_items(kind, range);
            match paginator.fetch_all(&url, token).await {
                Ok(items) => items
                    .into_iter()
                    .map(|item| with_field(item, "item_type", kind.as_str()))
                    .map(|item| with_field(item, "time_range", range.as_str()))
                    .collect(),
                Err(e) => {
                    skipped(&format!("top {} ({})", kind, range), &e);
                    Vec::new()
                }
            }
        });

        join_all(fetches).await.into_iter().flatten().collect()
    }
}

impl Tables {
    fn insert_normalized(&mut self, items: &[Value], kind: EntityKind) {
        self.insert(kind.table(), normalize_all(items, kind));
    }
}

/// Awaits `fetch` only when `enabled`; a disabled fetch issues no request.
async fn when<F>(enabled: bool, fetch: F) -> Result<Option<Vec<Value>>>
where
    F: Future<Output = Result<Vec<Value>>>,
{
    if enabled { fetch.await.map(Some) } else { Ok(None) }
}

/// Awaits a required fetch. Its first real failure cancels `abort`, which
/// stops every sibling fetch sharing the run's gate.
async fn fatal<F>(abort: &CancellationToken, resource: Resource, fetch: F) -> F::Output
where
    F: Future<Output = Result<Option<Vec<Value>>>>,
{
    let result = fetch.await;
    if let Err(e) = &result {
        if !e.is_cancelled() {
            tracing::error!(%resource, error = %e, "required resource failed, aborting run");
            abort.cancel();
        }
    }
    result
}

/// Picks the error to report once a phase has settled. Siblings stopped by an
/// abort fail with `Cancelled`, so the failure that caused it wins.
fn root_cause(errors: impl IntoIterator<Item = Option<Error>>) -> Error {
    let mut cancelled = None;
    for error in errors.into_iter().flatten() {
        if !error.is_cancelled() {
            return error;
        }
        cancelled = Some(error);
    }
    cancelled.unwrap_or(Error::Cancelled)
}

fn check_cancelled(gate: &RequestGate) -> Result<()> {
    if gate.cancel_token().is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok(())
}

fn skipped(what: &str, error: &Error) {
    if !error.is_cancelled() {
        tracing::warn!(unit = what, error = %error, "fetch failed, continuing without it");
    }
}

fn with_field(mut item: Value, key: &str, value: &str) -> Value {
    if let Value::Object(map) = &mut item {
        map.insert(key.to_string(), Value::String(value.to_string()));
    }
    item
}
