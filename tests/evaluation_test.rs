use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flagcache_lib::cache::{EvaluationCache, MemoryCache};
use flagcache_lib::store::{FlagStore, MemoryStore};
use flagcache_lib::{FlagRecord, FlagRequest, FlagService, Result};

/// Store that counts `get` calls and can slow them down to widen races.
#[derive(Default)]
struct SpyStore {
    inner: MemoryStore,
    reads: AtomicUsize,
    read_delay: Option<Duration>,
}

impl SpyStore {
    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FlagStore for SpyStore {
    async fn get(&self, key: &str) -> Result<Option<FlagRecord>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.get(key).await
    }

    async fn get_all(&self) -> Result<Vec<FlagRecord>> {
        self.inner.get_all().await
    }

    async fn upsert(&self, record: FlagRecord) -> Result<FlagRecord> {
        self.inner.upsert(record).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.inner.exists(key).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }
}

fn service_with(store: Arc<SpyStore>) -> (Arc<MemoryCache>, FlagService) {
    let cache = Arc::new(MemoryCache::new());
    let service = FlagService::new(store, cache.clone());
    (cache, service)
}

#[tokio::test]
async fn test_invalidate_forces_refill() {
    let cache = MemoryCache::new();
    for key in ["a", "b", "flag with spaces"] {
        cache.put(key, true, Duration::from_secs(60)).await.unwrap();
        cache.invalidate(key).await.unwrap();
        assert_eq!(cache.get(key).await.unwrap(), None);
    }
}

#[tokio::test]
async fn test_second_evaluation_is_served_from_cache() {
    let store = Arc::new(SpyStore::default());
    let (_cache, service) = service_with(store.clone());
    service
        .create_flag(&FlagRequest::new("enabled-flag", true))
        .await
        .unwrap();
    service
        .create_flag(&FlagRequest::new("disabled-flag", false))
        .await
        .unwrap();

    assert!(service.is_enabled("enabled-flag", None).await.unwrap());
    assert!(service.is_enabled("enabled-flag", None).await.unwrap());
    assert!(!service.is_enabled("disabled-flag", None).await.unwrap());
    assert!(!service.is_enabled("disabled-flag", None).await.unwrap());

    assert_eq!(store.reads(), 2);
}

#[tokio::test]
async fn test_unknown_flag_is_negative_cached() {
    let store = Arc::new(SpyStore::default());
    let (cache, service) = service_with(store.clone());

    assert!(!service.is_enabled("typo-flag", None).await.unwrap());
    assert!(!service.is_enabled("typo-flag", Some("user-9")).await.unwrap());

    assert_eq!(store.reads(), 1);
    assert_eq!(cache.get("typo-flag").await.unwrap(), Some(false));
}

#[tokio::test]
async fn test_write_then_read_sees_update_immediately() {
    let store = Arc::new(SpyStore::default());
    let (_cache, service) = service_with(store);

    service
        .create_flag(&FlagRequest::new("F", true))
        .await
        .unwrap();
    assert!(service.is_enabled("F", None).await.unwrap());

    let updated = service
        .update_flag("F", &FlagRequest::new("F", false))
        .await
        .unwrap();
    assert!(updated.is_some());
    assert!(!service.is_enabled("F", None).await.unwrap());
}

#[tokio::test]
async fn test_delete_then_evaluate_is_disabled() {
    let store = Arc::new(SpyStore::default());
    let (_cache, service) = service_with(store);

    service
        .create_flag(&FlagRequest::new("H", true))
        .await
        .unwrap();
    assert!(service.is_enabled("H", None).await.unwrap());

    assert!(service.delete_flag("H").await.unwrap());
    assert!(!service.is_enabled("H", None).await.unwrap());
    assert!(service.get_flag("H").await.unwrap().is_none());
}

#[tokio::test]
async fn test_concurrent_cold_evaluations_agree() {
    const CALLERS: usize = 32;

    let store = Arc::new(SpyStore {
        read_delay: Some(Duration::from_millis(10)),
        ..SpyStore::default()
    });
    let cache = Arc::new(MemoryCache::new());
    let service = Arc::new(FlagService::new(store.clone(), cache.clone()));
    service
        .create_flag(&FlagRequest::new("hot-flag", true))
        .await
        .unwrap();

    let mut handles = Vec::with_capacity(CALLERS);
    for i in 0..CALLERS {
        let service = Arc::clone(&service);
        let target = format!("user-{}", i);
        handles.push(tokio::spawn(async move {
            service.is_enabled("hot-flag", Some(&target)).await
        }));
    }

    for handle in handles {
        assert!(handle.await.unwrap().unwrap());
    }

    let reads = store.reads();
    assert!((1..=CALLERS).contains(&reads), "unexpected store reads: {}", reads);
    assert_eq!(cache.get("hot-flag").await.unwrap(), Some(true));
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_entry_expires_without_invalidation() {
    let store = Arc::new(SpyStore::default());
    let cache = Arc::new(MemoryCache::new());
    let service =
        FlagService::with_ttl(store.clone(), cache.clone(), Duration::from_millis(30));

    // Written behind the service's back: only TTL can surface it.
    store
        .upsert(FlagRecord::from_request(&FlagRequest::new("quiet", false)))
        .await
        .unwrap();
    assert!(!service.is_enabled("quiet", None).await.unwrap());

    store
        .upsert(FlagRecord::from_request(&FlagRequest::new("quiet", true)))
        .await
        .unwrap();
    assert!(!service.is_enabled("quiet", None).await.unwrap());

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(service.is_enabled("quiet", None).await.unwrap());
    assert_eq!(store.reads(), 2);
}

#[tokio::test]
async fn test_list_and_get_bypass_cache() {
    let store = Arc::new(SpyStore::default());
    let (cache, service) = service_with(store);

    service
        .create_flag(&FlagRequest::new("b", true))
        .await
        .unwrap();
    service
        .create_flag(&FlagRequest::new("a", false).with_config("{\"owner\":\"web\"}"))
        .await
        .unwrap();

    let all = service.list_flags().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].key, "a");
    assert_eq!(all[0].config.as_deref(), Some("{\"owner\":\"web\"}"));

    assert!(service.get_flag("b").await.unwrap().unwrap().enabled);
    assert!(service.get_flag("missing").await.unwrap().is_none());
    assert!(cache.is_empty());
}
