//! Cache-aside flag evaluation and cache-invalidating administration.
//!
//! Reads go cache first, then the store; every result (including "no such
//! flag", cached as `false`) is written back with the deployment TTL.
//! Writes commit to the store first and then invalidate the cache entry
//! before returning, so a reader that misses afterwards refills from the
//! committed state. Readers racing a write may still see the old value until
//! the entry is invalidated or its TTL runs out.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::cache::{EvaluationCache, DEFAULT_TTL};
use crate::error::Result;
use crate::flag::{validate_key, FlagRecord, FlagRequest};
use crate::store::FlagStore;

/// Where an evaluation result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalSource {
    /// Served from the evaluation cache.
    Cache,
    /// Read from the store and cached.
    Store,
    /// Flag is not in the store; `false` was negative-cached.
    Missing,
}

impl EvalSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvalSource::Cache => "cache",
            EvalSource::Store => "store",
            EvalSource::Missing => "missing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub enabled: bool,
    pub source: EvalSource,
}

pub struct FlagService {
    store: Arc<dyn FlagStore>,
    cache: Arc<dyn EvaluationCache>,
    ttl: Duration,
}

impl FlagService {
    pub fn new(store: Arc<dyn FlagStore>, cache: Arc<dyn EvaluationCache>) -> Self {
        Self::with_ttl(store, cache, DEFAULT_TTL)
    }

    pub fn with_ttl(
        store: Arc<dyn FlagStore>,
        cache: Arc<dyn EvaluationCache>,
        ttl: Duration,
    ) -> Self {
        Self { store, cache, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // ── Read path ───────────────────────────────────────────

    /// Evaluate a flag for a target.
    ///
    /// The target id is accepted for API stability but does not affect the
    /// result: evaluation is a plain per-key boolean lookup. Unknown flags
    /// evaluate to `false`, indistinguishable from a disabled flag.
    pub async fn evaluate(&self, key: &str, _target_id: Option<&str>) -> Result<Evaluation> {
        let key = validate_key(key)?;

        if let Some(enabled) = self.cache.get(key).await? {
            tracing::debug!(flag = %key, enabled, "evaluation cache hit");
            return Ok(Evaluation {
                enabled,
                source: EvalSource::Cache,
            });
        }

        match self.store.get(key).await? {
            Some(record) => {
                self.cache.put(key, record.enabled, self.ttl).await?;
                tracing::debug!(flag = %key, enabled = record.enabled, "evaluation cache filled from store");
                Ok(Evaluation {
                    enabled: record.enabled,
                    source: EvalSource::Store,
                })
            }
            None => {
                self.cache.put(key, false, self.ttl).await?;
                tracing::debug!(flag = %key, "unknown flag, negative-cached as disabled");
                Ok(Evaluation {
                    enabled: false,
                    source: EvalSource::Missing,
                })
            }
        }
    }

    pub async fn is_enabled(&self, key: &str, target_id: Option<&str>) -> Result<bool> {
        Ok(self.evaluate(key, target_id).await?.enabled)
    }

    /// Read a record straight from the store, bypassing the evaluation cache.
    pub async fn get_flag(&self, key: &str) -> Result<Option<FlagRecord>> {
        let key = validate_key(key)?;
        self.store.get(key).await
    }

    pub async fn list_flags(&self) -> Result<Vec<FlagRecord>> {
        self.store.get_all().await
    }

    // ── Write path ──────────────────────────────────────────

    /// Create (or, depending on the store, overwrite) a flag.
    pub async fn create_flag(&self, request: &FlagRequest) -> Result<FlagRecord> {
        validate_key(&request.key)?;
        let saved = self.store.upsert(FlagRecord::from_request(request)).await?;
        self.invalidate(&saved.key).await?;
        tracing::info!(flag = %saved.key, enabled = saved.enabled, "flag created");
        Ok(saved)
    }

    /// Update an existing flag. Returns `None` without touching the cache if
    /// the flag does not exist.
    pub async fn update_flag(&self, key: &str, request: &FlagRequest) -> Result<Option<FlagRecord>> {
        let key = validate_key(key)?;
        let Some(mut record) = self.store.get(key).await? else {
            return Ok(None);
        };

        record.enabled = request.enabled;
        record.config = request.config.clone();
        record.updated_at = Utc::now();

        let saved = self.store.upsert(record).await?;
        self.invalidate(&saved.key).await?;
        tracing::info!(flag = %saved.key, enabled = saved.enabled, "flag updated");
        Ok(Some(saved))
    }

    /// Delete a flag. Returns `false` without side effects if it does not exist.
    pub async fn delete_flag(&self, key: &str) -> Result<bool> {
        let key = validate_key(key)?;
        if !self.store.exists(key).await? {
            return Ok(false);
        }
        self.store.delete(key).await?;
        self.invalidate(key).await?;
        tracing::info!(flag = %key, "flag deleted");
        Ok(true)
    }

    async fn invalidate(&self, key: &str) -> Result<()> {
        self.cache.invalidate(key).await.map_err(|e| {
            tracing::error!(flag = %key, error = %e, "store write committed but cache invalidation failed");
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::cache::MemoryCache;
    use crate::error::Error;
    use crate::store::MemoryStore;

    /// Store wrapper counting reads and writes.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        gets: AtomicUsize,
        upserts: AtomicUsize,
    }

    #[async_trait]
    impl FlagStore for CountingStore {
        async fn get(&self, key: &str) -> Result<Option<FlagRecord>> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.inner.get(key).await
        }
        async fn get_all(&self) -> Result<Vec<FlagRecord>> {
            self.inner.get_all().await
        }
        async fn upsert(&self, record: FlagRecord) -> Result<FlagRecord> {
            self.upserts.fetch_add(1, Ordering::SeqCst);
            self.inner.upsert(record).await
        }
        async fn exists(&self, key: &str) -> Result<bool> {
            self.inner.exists(key).await
        }
        async fn delete(&self, key: &str) -> Result<()> {
            self.inner.delete(key).await
        }
    }

    struct DownStore;

    #[async_trait]
    impl FlagStore for DownStore {
        async fn get(&self, _key: &str) -> Result<Option<FlagRecord>> {
            Err(Error::Store("connection refused".into()))
        }
        async fn get_all(&self) -> Result<Vec<FlagRecord>> {
            Err(Error::Store("connection refused".into()))
        }
        async fn upsert(&self, _record: FlagRecord) -> Result<FlagRecord> {
            Err(Error::Store("connection refused".into()))
        }
        async fn exists(&self, _key: &str) -> Result<bool> {
            Err(Error::Store("connection refused".into()))
        }
        async fn delete(&self, _key: &str) -> Result<()> {
            Err(Error::Store("connection refused".into()))
        }
    }

    struct DownCache;

    #[async_trait]
    impl EvaluationCache for DownCache {
        async fn get(&self, _key: &str) -> Result<Option<bool>> {
            Err(Error::Cache("connection reset".into()))
        }
        async fn put(&self, _key: &str, _value: bool, _ttl: Duration) -> Result<()> {
            Err(Error::Cache("connection reset".into()))
        }
        async fn invalidate(&self, _key: &str) -> Result<()> {
            Err(Error::Cache("connection reset".into()))
        }
    }

    fn setup() -> (Arc<CountingStore>, Arc<MemoryCache>, FlagService) {
        let store = Arc::new(CountingStore::default());
        let cache = Arc::new(MemoryCache::new());
        let service = FlagService::new(store.clone(), cache.clone());
        (store, cache, service)
    }

    #[tokio::test]
    async fn test_evaluate_reports_source() {
        let (_store, _cache, service) = setup();
        service
            .create_flag(&FlagRequest::new("dark-mode", true))
            .await
            .unwrap();

        let first = service.evaluate("dark-mode", None).await.unwrap();
        assert_eq!(first, Evaluation { enabled: true, source: EvalSource::Store });

        let second = service.evaluate("dark-mode", None).await.unwrap();
        assert_eq!(second, Evaluation { enabled: true, source: EvalSource::Cache });

        let missing = service.evaluate("nope", None).await.unwrap();
        assert_eq!(missing, Evaluation { enabled: false, source: EvalSource::Missing });
    }

    #[tokio::test]
    async fn test_target_id_does_not_change_result() {
        let (_store, _cache, service) = setup();
        service
            .create_flag(&FlagRequest::new("beta", true))
            .await
            .unwrap();

        assert!(service.is_enabled("beta", Some("user-1")).await.unwrap());
        assert!(service.is_enabled("beta", Some("user-2")).await.unwrap());
        assert!(service.is_enabled("beta", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_blank_key_touches_nothing() {
        let (store, cache, service) = setup();

        assert!(matches!(service.evaluate("  ", None).await, Err(Error::BlankKey)));
        assert!(matches!(
            service.create_flag(&FlagRequest::new("", true)).await,
            Err(Error::BlankKey)
        ));
        assert!(matches!(
            service.update_flag(" ", &FlagRequest::new(" ", true)).await,
            Err(Error::BlankKey)
        ));
        assert!(matches!(service.delete_flag("").await, Err(Error::BlankKey)));

        assert_eq!(store.gets.load(Ordering::SeqCst), 0);
        assert_eq!(store.upserts.load(Ordering::SeqCst), 0);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_create_invalidates_negative_entry() {
        let (_store, cache, service) = setup();

        assert!(!service.is_enabled("launch", None).await.unwrap());
        assert_eq!(cache.get("launch").await.unwrap(), Some(false));

        service
            .create_flag(&FlagRequest::new("launch", true))
            .await
            .unwrap();
        assert_eq!(cache.get("launch").await.unwrap(), None);
        assert!(service.is_enabled("launch", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_missing_flag_leaves_cache_alone() {
        let (store, cache, service) = setup();
        cache.put("ghost", true, DEFAULT_TTL).await.unwrap();

        let result = service
            .update_flag("ghost", &FlagRequest::new("ghost", false))
            .await
            .unwrap();

        assert!(result.is_none());
        assert_eq!(store.upserts.load(Ordering::SeqCst), 0);
        assert_eq!(cache.get("ghost").await.unwrap(), Some(true));
    }

    #[tokio::test]
    async fn test_delete_missing_flag_leaves_cache_alone() {
        let (_store, cache, service) = setup();
        cache.put("ghost", true, DEFAULT_TTL).await.unwrap();

        assert!(!service.delete_flag("ghost").await.unwrap());
        assert_eq!(cache.get("ghost").await.unwrap(), Some(true));
    }

    #[tokio::test]
    async fn test_update_keeps_path_key_and_stamps_time() {
        let (_store, _cache, service) = setup();
        let created = service
            .create_flag(&FlagRequest::new("checkout", true).with_config("{\"v\":1}"))
            .await
            .unwrap();

        let updated = service
            .update_flag("checkout", &FlagRequest::new("other-key", false).with_config("{\"v\":2}"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.key, "checkout");
        assert!(!updated.enabled);
        assert_eq!(updated.config.as_deref(), Some("{\"v\":2}"));
        assert!(updated.updated_at >= created.updated_at);
        assert!(service.get_flag("other-key").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_failure_propagates_and_is_not_cached() {
        let cache = Arc::new(MemoryCache::new());
        let service = FlagService::new(Arc::new(DownStore), cache.clone());

        let err = service.evaluate("dark-mode", None).await.unwrap_err();
        assert!(matches!(err, Error::Store(_)));
        assert!(err.is_unavailable());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_configured_ttl_is_applied() {
        let store = Arc::new(CountingStore::default());
        let cache = Arc::new(MemoryCache::new());
        let service =
            FlagService::with_ttl(store.clone(), cache.clone(), Duration::from_millis(20));
        service
            .create_flag(&FlagRequest::new("short", true))
            .await
            .unwrap();

        assert!(service.is_enabled("short", None).await.unwrap());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(service.is_enabled("short", None).await.unwrap());
        assert_eq!(store.gets.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cache_failure_fails_evaluation_without_store_read() {
        let store = Arc::new(CountingStore::default());
        store
            .inner
            .upsert(FlagRecord::from_request(&FlagRequest::new("dark-mode", true)))
            .await
            .unwrap();
        let service = FlagService::new(store.clone(), Arc::new(DownCache));

        let err = service.evaluate("dark-mode", None).await.unwrap_err();
        assert!(matches!(err, Error::Cache(_)));
        assert!(err.is_unavailable());
        assert_eq!(store.gets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_invalidation_keeps_committed_write() {
        let store = Arc::new(CountingStore::default());
        let service = FlagService::new(store.clone(), Arc::new(DownCache));

        let err = service
            .create_flag(&FlagRequest::new("launch", true))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cache(_)));
        assert_eq!(store.upserts.load(Ordering::SeqCst), 1);

        let saved = service.get_flag("launch").await.unwrap().unwrap();
        assert!(saved.enabled);
    }
}
