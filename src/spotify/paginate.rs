use std::collections::HashSet;

use serde_json::Value;

use crate::{
    error::{Error, Result},
    spotify::gate::RequestGate,
    types::Page,
};

/// Walks a paginated collection by following `next` links.
///
/// Holds no cursor state of its own, so one paginator can serve any number of
/// concurrent walks. Every page goes through the shared [`RequestGate`].
#[derive(Clone, Copy)]
pub struct Paginator<'a> {
    gate: &'a RequestGate,
    envelope: Option<&'static str>,
}

impl<'a> Paginator<'a> {
    pub fn new(gate: &'a RequestGate) -> Self {
        Self {
            gate,
            envelope: None,
        }
    }

    /// Reads pages from `body[key]` instead of the body itself, as
    /// `/me/following` does with its `artists` object.
    pub fn with_envelope(mut self, key: &'static str) -> Self {
        self.envelope = Some(key);
        self
    }

    /// Fetches one page and returns its items and continuation URL.
    pub async fn fetch_page(&self, url: &str, token: &str) -> Result<Page> {
        let body = self.gate.request(url, token).await?;
        self.parse_page(url, body)
    }

    /// Fetches every page starting at `start_url`, in page order.
    ///
    /// Stops when a page has no `next`. A failed page fails the whole walk;
    /// nothing fetched so far is returned. A `next` pointing back at a page
    /// already fetched in this walk is [`Error::Malformed`].
    pub async fn fetch_all(&self, start_url: &str, token: &str) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut visited = HashSet::new();
        let mut current = Some(start_url.to_string());

        while let Some(url) = current {
            if visited.contains(&url) {
                tracing::warn!(url = start_url, repeated = %url, "pagination loop detected");
                return Err(Error::Malformed {
                    url,
                    reason: "next points back to an already fetched page".to_string(),
                });
            }

            let page = self.fetch_page(&url, token).await?;
            items.extend(page.items);
            current = page.next.filter(|next| !next.is_empty());
            visited.insert(url);
        }

        tracing::debug!(
            url = start_url,
            pages = visited.len(),
            items = items.len(),
            "collection fetched"
        );
        Ok(items)
    }

    fn parse_page(&self, url: &str, mut body: Value) -> Result<Page> {
        if let Some(key) = self.envelope {
            body = match body.get_mut(key) {
                Some(inner) => inner.take(),
                None => {
                    return Err(Error::Malformed {
                        url: url.to_string(),
                        reason: format!("missing '{}' object", key),
                    });
                }
            };
        }

        if !body.get("items").is_some_and(Value::is_array) {
            return Err(Error::Malformed {
                url: url.to_string(),
                reason: "missing 'items' array".to_string(),
            });
        }

        serde_json::from_value(body).map_err(|e| Error::Malformed {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}
