pub mod cache;
pub mod config;
mod metrics;
mod routes;
mod state;
pub mod store;

use std::process;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use flagcache_lib::cache::MemoryCache;
use flagcache_lib::FlagService;
use tower_http::compression::CompressionLayer;

use self::cache::CacheHandle;
use self::config::{FlagcacheConfig, StorageBackend};
use self::metrics::{handle_metrics, metrics, track_metrics};
use self::routes::{
    handle_create, handle_delete, handle_evaluate, handle_get, handle_health, handle_list,
    handle_update,
};
use self::state::AppState;
use self::store::open_store;

/// Command-line overrides for `serve`; each wins over the config file.
#[derive(Debug, Default)]
pub struct ServeArgs {
    pub config_path: String,
    pub port: Option<u16>,
    pub hostname: Option<String>,
    pub storage: Option<StorageBackend>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/metrics", get(handle_metrics))
        .route("/flags", get(handle_list).post(handle_create))
        .route(
            "/flags/{key}",
            get(handle_get).put(handle_update).delete(handle_delete),
        )
        .route("/flags/evaluate/{key}", get(handle_evaluate))
        .layer(axum::middleware::from_fn(track_metrics))
        .layer(CompressionLayer::new())
        .with_state(state)
}

/// Periodically drop expired in-process cache entries. Correctness never
/// depends on this; it only bounds memory held by keys nobody reads again.
async fn purge_expired_entries(cache: Arc<MemoryCache>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.tick().await;
    loop {
        interval.tick().await;
        let purged = cache.purge_expired();
        if purged > 0 {
            metrics()
                .cache_purged
                .with_label_values(&["memory"])
                .inc_by(purged as u64);
            tracing::debug!(purged, remaining = cache.len(), "swept expired cache entries");
        }
    }
}

pub async fn run_serve(args: ServeArgs) {
    // Config file, then environment, then CLI flags
    let mut config = FlagcacheConfig::load(&args.config_path);
    config.apply_env_overrides();
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(hostname) = args.hostname {
        config.server.hostname = hostname;
    }
    if let Some(storage) = args.storage {
        config.storage.backend = storage;
    }

    let store = open_store(&config.storage).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to open flag store");
        process::exit(1);
    });

    let cache = CacheHandle::connect(&config.cache).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to set up evaluation cache");
        process::exit(1);
    });

    if let CacheHandle::Memory(ref memory) = cache {
        if config.cache.purge_interval_secs > 0 {
            tokio::spawn(purge_expired_entries(
                Arc::clone(memory),
                Duration::from_secs(config.cache.purge_interval_secs),
            ));
        }
    }

    let state = Arc::new(AppState {
        service: FlagService::with_ttl(store, cache.as_evaluation_cache(), config.cache.ttl()),
        cache_backend: cache.backend_name(),
    });

    let app = router(state);

    let addr = format!("{}:{}", config.server.hostname, config.server.port);
    tracing::info!(
        addr = %addr,
        cache = cache.backend_name(),
        ttl_secs = config.cache.ttl_secs,
        "serving flag evaluations"
    );

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(addr = %addr, error = %e, "failed to bind");
            process::exit(1);
        });

    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!(error = %e, "failed to install SIGTERM handler");
                    process::exit(1);
                }
            };

        #[cfg(unix)]
        tokio::select! {
            _ = ctrl_c => {},
            _ = sigterm.recv() => {},
        }

        #[cfg(not(unix))]
        ctrl_c.await.ok();

        tracing::info!("shutdown signal received, finishing in-flight requests");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "server error");
            process::exit(1);
        });

    tracing::info!("server stopped");
}
