//! Per-plugin result cache
//!
//! Entries expire at an absolute instant. Expired entries read as misses and
//! are evicted lazily; `purge_expired` is only a memory optimisation.

use std::time::Duration;
use dashmap::DashMap;
use tokio::time::Instant;
use crate::model::CollectionResult;

/// (plugin type, device id, metric name)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub plugin_type: String,
    pub device_id: u64,
    pub metric_name: String,
}

impl CacheKey {
    pub fn new(plugin_type: impl Into<String>, device_id: u64, metric_name: impl Into<String>) -> Self {
        Self {
            plugin_type: plugin_type.into(),
            device_id,
            metric_name: metric_name.into(),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.plugin_type, self.device_id, self.metric_name)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    result: CollectionResult,
    expires_at: Instant,
}

#[derive(Debug, Default)]
pub struct ResultCache {
    entries: DashMap<CacheKey, CacheEntry>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a live entry; an expired entry is removed and reported as a miss
    pub fn get(&self, key: &CacheKey) -> Option<CollectionResult> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if now < entry.expires_at {
                return Some(entry.result.clone());
            }
        }
        self.entries.remove_if(key, |_, entry| now >= entry.expires_at);
        None
    }

    pub fn put(&self, key: CacheKey, result: CollectionResult, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.entries.insert(key, CacheEntry { result, expires_at });
    }

    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| now < entry.expires_at);
        before - self.entries.len()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
