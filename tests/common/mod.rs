#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use serde_json::{Value, json};
use spotetl::{
    config::PipelineConfig,
    error::{Error, Result},
    spotify::{
        gate::{GateLimits, RequestGate},
        transport::{HttpReply, Transport},
    },
};
use tokio_util::sync::CancellationToken;

pub const API: &str = "http://api.test/v1";
pub const TOKEN: &str = "test-token";

type Handler = Box<dyn Fn(&str) -> HttpReply + Send + Sync>;

/// Transport that answers from a per-URL script.
///
/// Each URL owns a queue of replies; the last reply repeats once the queue is
/// down to one. URLs without a script go to the optional handler, then 404.
/// Every call sleeps for `latency` so concurrent requests overlap.
pub struct FakeTransport {
    scripts: Mutex<HashMap<String, VecDeque<HttpReply>>>,
    handler: Option<Handler>,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    requests: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            handler: None,
            latency: Duration::from_millis(10),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str) -> HttpReply + Send + Sync + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Answers `url` with the given replies, in order.
    pub fn script(self, url: impl Into<String>, replies: Vec<HttpReply>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.into(), replies.into_iter().collect());
        self
    }

    pub fn json(self, url: impl Into<String>, body: Value) -> Self {
        self.script(url, vec![HttpReply::ok(body.to_string())])
    }

    pub fn fail(self, url: impl Into<String>, status: u16) -> Self {
        self.script(url, vec![HttpReply::status(status)])
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, url: &str) -> usize {
        self.requests().iter().filter(|u| u.as_str() == url).count()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|u| u.starts_with(prefix))
            .count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_reply(&self, url: &str) -> HttpReply {
        let mut scripts = self.scripts.lock().unwrap();
        if let Some(queue) = scripts.get_mut(url) {
            if queue.len() > 1 {
                return queue.pop_front().unwrap();
            }
            if let Some(reply) = queue.front() {
                return reply.clone();
            }
        }
        drop(scripts);

        match &self.handler {
            Some(handler) => handler(url),
            None => HttpReply::status(404),
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, url: &str, token: &str) -> Result<HttpReply> {
        assert_eq!(token, TOKEN, "request sent without the run's token");
        self.requests.lock().unwrap().push(url.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.latency).await;
        let reply = self.next_reply(url);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(reply)
    }
}

/// Transport whose every call hangs until the test ends.
pub struct HangingTransport;

#[async_trait]
impl Transport for HangingTransport {
    async fn get(&self, url: &str, _token: &str) -> Result<HttpReply> {
        std::future::pending::<()>().await;
        Err(Error::Timeout {
            url: url.to_string(),
        })
    }
}

pub fn limits() -> GateLimits {
    GateLimits::from(&PipelineConfig::default())
}

pub fn gate(transport: Arc<dyn Transport>, max_concurrency: usize) -> RequestGate {
    RequestGate::new(transport, max_concurrency, limits(), CancellationToken::new())
}

/// A collection page with `items` and an optional continuation URL.
pub fn page(items: Vec<Value>, next: Option<&str>) -> Value {
    json!({ "items": items, "next": next })
}

pub fn track(id: Option<&str>, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "artists": [{ "name": format!("{} artist", name) }, { "name": "feat" }],
        "album": { "name": format!("{} album", name) },
    })
}

pub fn playlist_item(id: &str) -> Value {
    json!({ "added_at": "2024-01-01T00:00:00Z", "track": track(Some(id), id) })
}

pub fn saved_item(id: &str) -> Value {
    json!({ "added_at": "2024-02-02T00:00:00Z", "track": track(Some(id), id) })
}

pub fn playlist(id: &str, total: u64) -> Value {
    json!({
        "id": id,
        "href": format!("{}/playlists/{}", API, id),
        "name": format!("Playlist {}", id),
        "owner": { "display_name": "owner" },
        "public": true,
        "collaborative": false,
        "tracks": { "total": total },
    })
}

pub fn feature(id: &str) -> Value {
    json!({
        "id": id,
        "danceability": 0.5,
        "energy": 0.7,
        "key": 5,
        "loudness": -6.5,
        "mode": 1,
        "tempo": 120.0,
        "duration_ms": 200000,
        "time_signature": 4,
    })
}

/// Answers `/audio-features?ids=a,b,c` with one feature per id.
pub fn features_handler(url: &str) -> HttpReply {
    match url.split_once("/audio-features?ids=") {
        Some((_, ids)) => {
            let features: Vec<Value> = ids.split(',').map(feature).collect();
            HttpReply::ok(json!({ "audio_features": features }).to_string())
        }
        None => HttpReply::status(404),
    }
}
