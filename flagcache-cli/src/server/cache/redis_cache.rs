use std::time::Duration;

use async_trait::async_trait;
use flagcache_lib::cache::{cache_key, EvaluationCache};
use flagcache_lib::{Error, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

/// Evaluation cache shared between server processes through Redis.
///
/// Values are stored as `1`/`0` under `flag:<key>` with a native `EX` expiry.
/// Redis errors surface as [`Error::Cache`]; the request fails rather than
/// falling through to the store.
pub struct RedisCache {
    conn: ConnectionManager,
}

fn cache_err(context: &str, e: redis::RedisError) -> Error {
    Error::Cache(format!("{}: {}", context, e))
}

impl RedisCache {
    pub async fn connect(url: &str) -> std::result::Result<Self, String> {
        let client =
            redis::Client::open(url).map_err(|e| format!("invalid redis url '{}': {}", url, e))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| format!("failed to connect to redis at {}: {}", url, e))?;
        Ok(Self { conn })
    }
}

/// `SET EX` rejects 0, so sub-second TTLs round up to one second.
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl EvaluationCache for RedisCache {
    async fn get(&self, flag_key: &str) -> Result<Option<bool>> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<bool>>(cache_key(flag_key))
            .await
            .map_err(|e| cache_err("redis GET failed", e))
    }

    async fn put(&self, flag_key: &str, value: bool, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(cache_key(flag_key), value, ttl_secs(ttl))
            .await
            .map_err(|e| cache_err("redis SET failed", e))
    }

    async fn invalidate(&self, flag_key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(cache_key(flag_key))
            .await
            .map_err(|e| cache_err("redis DEL failed", e))
    }
}
