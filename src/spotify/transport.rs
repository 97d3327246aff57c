use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header::RETRY_AFTER};

use crate::error::{Error, Result};

/// What the gate needs to know about one HTTP exchange.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    /// `Retry-After` in whole seconds, when the header was present and numeric.
    pub retry_after: Option<u64>,
    pub body: String,
}

impl HttpReply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            retry_after: None,
            body: body.into(),
        }
    }

    pub fn too_many_requests(retry_after: Option<u64>) -> Self {
        Self {
            status: 429,
            retry_after,
            body: String::new(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            retry_after: None,
            body: String::new(),
        }
    }
}

/// A single authenticated GET.
///
/// Implementations report every status they receive; deciding what a 429 or a
/// 500 means is the gate's job.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, token: &str) -> Result<HttpReply>;
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(connect_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|source| Error::Http {
                url: String::new(),
                source,
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str, token: &str) -> Result<HttpReply> {
        let to_error = |source: reqwest::Error| {
            if source.is_timeout() {
                Error::Timeout {
                    url: url.to_string(),
                }
            } else {
                Error::Http {
                    url: url.to_string(),
                    source,
                }
            }
        };

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(to_error)?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response.text().await.map_err(to_error)?;

        Ok(HttpReply {
            status,
            retry_after,
            body,
        })
    }
}
