//! Crate-wide error type.
//!
//! Fetch errors always carry the URL of the request that failed so a log line
//! is enough to tell which resource broke a run.

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network or protocol failure reported by the HTTP client.
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Upstream answered with a status that is neither 200 nor 429.
    #[error("request to {url} returned status {status}")]
    Status { url: String, status: u16 },

    /// Upstream kept answering 429 past the retry ceiling, or asked for an
    /// unreasonable wait.
    #[error("request to {url} still rate limited after {attempts} attempts")]
    RateLimited { url: String, attempts: u32 },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("run cancelled")]
    Cancelled,

    /// The body could not be read as the JSON shape the caller expected.
    #[error("malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// URL of the failed request, if the error came from a fetch.
    pub fn url(&self) -> Option<&str> {
        match self {
            Error::Http { url, .. }
            | Error::Status { url, .. }
            | Error::RateLimited { url, .. }
            | Error::Timeout { url }
            | Error::Malformed { url, .. } => Some(url),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
