use std::{future::Future, sync::Arc, time::Duration};

use serde_json::Value;
use tokio::{
    sync::Semaphore,
    time::{sleep, timeout},
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::PipelineConfig,
    error::{Error, Result},
    spotify::transport::Transport,
};

/// Timing and retry knobs for [`RequestGate`].
#[derive(Debug, Clone)]
pub struct GateLimits {
    pub pacing: Duration,
    pub max_retries: u32,
    pub default_retry_after: Duration,
    pub max_retry_after: Duration,
    pub request_timeout: Duration,
}

impl From<&PipelineConfig> for GateLimits {
    fn from(cfg: &PipelineConfig) -> Self {
        Self {
            pacing: cfg.pacing,
            max_retries: cfg.max_retries,
            default_retry_after: cfg.default_retry_after,
            max_retry_after: cfg.max_retry_after,
            request_timeout: cfg.request_timeout,
        }
    }
}

/// Wraps every GET of a run with a shared concurrency bound, 429 handling and
/// a pacing delay.
///
/// One gate is created per run and shared by reference between all fetches,
/// so the bound holds across pagination, per-playlist fan-out and feature
/// batches alike.
///
/// # Rate Limiting
///
/// A 429 response releases the slot, waits for `Retry-After` seconds (or
/// `default_retry_after * 2^attempt` without the header) and re-issues the
/// request. After `max_retries` re-issues, or when the server asks for more
/// than `max_retry_after`, the request fails with [`Error::RateLimited`].
///
/// # Cancellation
///
/// Every wait (slot, request, back-off, pacing) races the run's
/// [`CancellationToken`] and resolves to [`Error::Cancelled`] once it fires.
pub struct RequestGate {
    transport: Arc<dyn Transport>,
    permits: Semaphore,
    max_concurrency: usize,
    limits: GateLimits,
    cancel: CancellationToken,
}

impl RequestGate {
    pub fn new(
        transport: Arc<dyn Transport>,
        max_concurrency: usize,
        limits: GateLimits,
        cancel: CancellationToken,
    ) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            transport,
            permits: Semaphore::new(max_concurrency),
            max_concurrency,
            limits,
            cancel,
        }
    }

    pub fn from_config(
        transport: Arc<dyn Transport>,
        cfg: &PipelineConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self::new(transport, cfg.max_concurrency, GateLimits::from(cfg), cancel)
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Issues `GET url` and returns the parsed JSON body of a 200 response.
    ///
    /// Any status other than 200 or 429 is returned as [`Error::Status`]
    /// without retrying.
    pub async fn request(&self, url: &str, token: &str) -> Result<Value> {
        let mut attempt: u32 = 0;

        loop {
            let permit = self
                .guard(self.permits.acquire())
                .await?
                .map_err(|_| Error::Cancelled)?;

            let reply = match self
                .guard(timeout(
                    self.limits.request_timeout,
                    self.transport.get(url, token),
                ))
                .await?
            {
                Ok(reply) => reply?,
                Err(_) => {
                    return Err(Error::Timeout {
                        url: url.to_string(),
                    });
                }
            };

            match reply.status {
                200 => {
                    let body: Value =
                        serde_json::from_str(&reply.body).map_err(|e| Error::Malformed {
                            url: url.to_string(),
                            reason: e.to_string(),
                        })?;
                    self.guard(sleep(self.limits.pacing)).await?;
                    drop(permit);
                    return Ok(body);
                }
                429 => {
                    drop(permit);
                    let wait = self.backoff(url, attempt, reply.retry_after)?;
                    attempt += 1;
                    tracing::warn!(
                        url,
                        attempt,
                        wait_secs = wait.as_secs_f64(),
                        "rate limited, backing off"
                    );
                    self.guard(sleep(wait)).await?;
                }
                status => {
                    return Err(Error::Status {
                        url: url.to_string(),
                        status,
                    });
                }
            }
        }
    }

    fn backoff(&self, url: &str, attempt: u32, retry_after: Option<u64>) -> Result<Duration> {
        let exhausted = || Error::RateLimited {
            url: url.to_string(),
            attempts: attempt + 1,
        };

        if attempt >= self.limits.max_retries {
            tracing::warn!(url, attempts = attempt + 1, "retry ceiling reached");
            return Err(exhausted());
        }

        let wait = match retry_after {
            Some(secs) => Duration::from_secs(secs),
            None => self
                .limits
                .default_retry_after
                .saturating_mul(1u32 << attempt.min(16)),
        };

        if wait > self.limits.max_retry_after {
            tracing::warn!(
                url,
                wait_secs = wait.as_secs(),
                "retry-after is abnormally high, giving up on this request"
            );
            return Err(exhausted());
        }

        Ok(wait)
    }

    async fn guard<F: Future>(&self, fut: F) -> Result<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            out = fut => Ok(out),
        }
    }
}
