//! # Spotify Integration Module
//!
//! The layer between the extraction pipeline and the Spotify Web API. It owns
//! every HTTP request the tool makes and the rules that keep those requests
//! within what the API tolerates.
//!
//! ## Architecture
//!
//! ```text
//! Pipeline (fan-out, phases)
//!          ↓
//! Paginator / Feature batches
//!          ↓
//! RequestGate (concurrency bound, 429 back-off, pacing, timeout, cancel)
//!          ↓
//! Transport (reqwest)
//!          ↓
//! Spotify Web API
//! ```
//!
//! ## Core Modules
//!
//! - [`gate`] - the only shared mutable resource of a run. A semaphore bounds
//!   in-flight requests (5 by default); 429 responses are retried after the
//!   `Retry-After` delay up to a ceiling; every success is followed by a short
//!   pacing delay.
//! - [`paginate`] - follows `next` links until a collection is exhausted.
//! - [`features`] - resolves audio features in batches of at most 100 ids.
//! - [`endpoints`] - URL builders for the resources read by the pipeline.
//! - [`transport`] - the `Transport` seam; the production implementation is
//!   backed by `reqwest`, tests plug in scripted replies.
//! - [`auth`] - OAuth 2.0 authorization code flow with PKCE and the
//!   refresh-token exchange used by the token manager.
//!
//! ## API Coverage
//!
//! - `GET /me` - user profile
//! - `GET /me/playlists` - playlists (paginated)
//! - `GET /playlists/{id}/tracks` - playlist tracks (paginated, one walk per playlist)
//! - `GET /me/tracks` - saved tracks (paginated)
//! - `GET /me/player/recently-played` - recent plays (single page)
//! - `GET /me/following?type=artist` - followed artists (paginated, `artists` envelope)
//! - `GET /me/top/{artists|tracks}?time_range=...` - top items
//! - `GET /audio-features?ids=...` - audio features (batched)
//! - `POST /api/token` - code exchange and token refresh

pub mod auth;
pub mod endpoints;
pub mod features;
pub mod gate;
pub mod paginate;
pub mod transport;
