use std::collections::HashSet;

use serde_json::Value;

/// Deduplicated track ids in first-seen order.
///
/// Null, missing and empty ids never enter the set.
#[derive(Debug, Clone, Default)]
pub struct TrackIdSet {
    ids: Vec<String>,
    seen: HashSet<String>,
}

impl TrackIdSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `id` unless it is absent, empty or already present.
    pub fn insert(&mut self, id: Option<&str>) -> bool {
        match id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) if self.seen.insert(id.to_string()) => {
                self.ids.push(id.to_string());
                true
            }
            _ => false,
        }
    }

    /// Adds `item.track.id` of every raw playlist or saved-track item.
    pub fn extend_from_items<'a, I>(&mut self, items: I)
    where
        I: IntoIterator<Item = &'a Value>,
    {
        for item in items {
            self.insert(item["track"]["id"].as_str());
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.ids
    }
}
