//! Spotify listening-data extractor library
//!
//! This library extracts a user's listening data (playlists, saved and
//! recently played tracks, followed artists, top items, audio features) from
//! the Spotify Web API, normalizes each resource into a flat table and loads
//! the tables into a relational database.
//!
//! # Modules
//!
//! - `api` - HTTP endpoints for the local OAuth callback server
//! - `cli` - Command-line interface implementations
//! - `config` - Environment loading, credentials and pipeline limits
//! - `error` - Crate-wide error type
//! - `management` - Token caching and refresh
//! - `normalize` - Raw item to record mapping and table schemas
//! - `pipeline` - The concurrent fan-out orchestrator
//! - `server` - Local HTTP server for OAuth callbacks
//! - `spotify` - Spotify Web API client: gate, pagination, batching, auth
//! - `store` - Table loader
//! - `types` - Token types and raw API shapes
//! - `utils` - Utility functions and helpers
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use spotetl::{config::PipelineConfig, pipeline::Pipeline, spotify::transport::ReqwestTransport};
//! use tokio_util::sync::CancellationToken;
//!
//! let transport = Arc::new(ReqwestTransport::new(Duration::from_secs(10))?);
//! let pipeline = Pipeline::new(transport, &config.api_url, PipelineConfig::default(), CancellationToken::new());
//! let tables = pipeline.run(&token).await?;
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod management;
pub mod normalize;
pub mod pipeline;
pub mod server;
pub mod spotify;
pub mod store;
pub mod types;
pub mod utils;

pub use error::{Error, Result};

/// Prints an informational message with a blue bullet point.
///
/// # Example
///
/// ```
/// info!("Fetching listening data...");
/// info!("Found {} playlists", count);
/// ```
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a success message with a green checkmark.
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints an error message with a red exclamation mark and exits the program.
///
/// Only the CLI layer uses this; library code returns errors instead.
///
/// # Example
///
/// ```
/// error!("Run failed: {}", e);
/// // Program exits here - code after this will not execute
/// ```
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    eprintln!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1);
  })
}

/// Prints a warning message with a yellow exclamation mark.
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}
