//! # CLI Module
//!
//! User-facing commands of spotetl. Each command loads what it needs from the
//! [`Config`](crate::config::Config) it is handed, drives the library layers
//! and turns their results into terminal output.
//!
//! ## Commands
//!
//! - [`auth`] - runs the OAuth 2.0 PKCE flow in the browser and caches the
//!   resulting token
//! - [`run`] - extracts every selected resource, normalizes it and loads the
//!   tables into the configured database
//!
//! ## Architecture
//!
//! ```text
//! CLI Layer (progress, summary, exit codes)
//!     ↓
//! Management Layer (token cache)
//!     ↓
//! Pipeline (fan-out over the request gate)
//!     ↓
//! Store (relational loader)
//! ```
//!
//! Library layers return [`crate::Error`]; only this layer prints and exits.
//!
//! ## Usage
//!
//! ```bash
//! spotetl auth                                  # authorize once
//! spotetl run                                   # extract and append everything
//! spotetl run --only playlists,playlist-tracks  # a subset
//! spotetl run --mode replace --dry-run          # fetch without writing
//! ```

mod auth;
mod run;

pub use auth::auth;
pub use run::{RunOptions, run};
