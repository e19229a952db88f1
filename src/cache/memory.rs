use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{cache_key, EvaluationCache};
use crate::error::Result;

#[derive(Clone, Copy, Debug)]
struct CacheEntry {
    value: bool,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn new(value: bool, ttl: Duration) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
            ttl,
        }
    }

    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() >= self.ttl
    }
}

/// In-process evaluation cache backed by a sharded `DashMap`.
///
/// Expired entries read as absent and are removed lazily on the read that
/// finds them, or in bulk by [`MemoryCache::purge_expired`].
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Drop every expired entry and return how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before.saturating_sub(self.entries.len())
    }

    /// Number of stored entries, expired ones included until reaped.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl EvaluationCache for MemoryCache {
    async fn get(&self, flag_key: &str) -> Result<Option<bool>> {
        let key = cache_key(flag_key);
        if let Some(entry) = self.entries.get(&key) {
            if !entry.is_expired() {
                return Ok(Some(entry.value));
            }
        }
        // Only reap if still expired; a concurrent put may have refreshed it.
        self.entries.remove_if(&key, |_, entry| entry.is_expired());
        Ok(None)
    }

    async fn put(&self, flag_key: &str, value: bool, ttl: Duration) -> Result<()> {
        self.entries
            .insert(cache_key(flag_key), CacheEntry::new(value, ttl));
        Ok(())
    }

    async fn invalidate(&self, flag_key: &str) -> Result<()> {
        self.entries.remove(&cache_key(flag_key));
        Ok(())
    }
}
