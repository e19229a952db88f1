pub mod redis_cache;

use std::sync::Arc;

use flagcache_lib::cache::{EvaluationCache, MemoryCache};

use self::redis_cache::RedisCache;
use super::config::{CacheBackendKind, CacheConfig};

/// The evaluation cache chosen at startup.
///
/// The in-process variant is kept concrete so the server can sweep it.
pub enum CacheHandle {
    Memory(Arc<MemoryCache>),
    Redis(Arc<RedisCache>),
}

impl CacheHandle {
    pub async fn connect(config: &CacheConfig) -> Result<Self, String> {
        match config.backend {
            CacheBackendKind::Memory => {
                tracing::info!(ttl_secs = config.ttl_secs, "using in-process evaluation cache");
                Ok(CacheHandle::Memory(Arc::new(MemoryCache::new())))
            }
            CacheBackendKind::Redis => {
                tracing::info!(url = %config.redis_url, ttl_secs = config.ttl_secs, "using redis evaluation cache");
                let cache = RedisCache::connect(&config.redis_url).await?;
                Ok(CacheHandle::Redis(Arc::new(cache)))
            }
        }
    }

    pub fn as_evaluation_cache(&self) -> Arc<dyn EvaluationCache> {
        match self {
            CacheHandle::Memory(cache) => cache.clone(),
            CacheHandle::Redis(cache) => cache.clone(),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            CacheHandle::Memory(_) => "memory",
            CacheHandle::Redis(_) => "redis",
        }
    }
}
