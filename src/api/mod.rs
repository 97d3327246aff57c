//! # API Module
//!
//! HTTP endpoints served by the short-lived local server that the `auth`
//! command starts.
//!
//! - [`callback`] completes the OAuth 2.0 PKCE flow by exchanging the
//!   authorization code Spotify redirects back with for a token.
//! - [`health`] reports status and version, which is handy to check that the
//!   redirect URI actually reaches this process.

mod callback;
mod health;

pub use callback::{CallbackState, callback};
pub use health::health;
