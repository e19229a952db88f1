//! Server-side evaluation cache.
//!
//! Maps a flag key to its last known boolean state, including the negative
//! `false` placeholder recorded for keys the store does not know. Entries
//! expire a fixed TTL after insertion; reads never extend that lifetime and
//! never return an expired value.

pub mod memory;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

pub use memory::MemoryCache;

/// Default lifetime of an evaluation cache entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

const KEY_PREFIX: &str = "flag:";

/// Storage key for a flag in any cache backend.
pub fn cache_key(flag_key: &str) -> String {
    format!("{}{}", KEY_PREFIX, flag_key)
}

/// A TTL key-value cache of flag evaluation results.
///
/// All operations on a single key are atomic with respect to each other.
#[async_trait]
pub trait EvaluationCache: Send + Sync {
    /// Cached state of `flag_key`, or `None` if absent or expired.
    async fn get(&self, flag_key: &str) -> Result<Option<bool>>;

    /// Store `value`, replacing any existing entry and resetting its expiry
    /// to `now + ttl`.
    async fn put(&self, flag_key: &str, value: bool, ttl: Duration) -> Result<()>;

    /// Remove the entry for `flag_key`. Idempotent.
    async fn invalidate(&self, flag_key: &str) -> Result<()>;
}
