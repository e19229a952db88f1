use flagcache_lib::FlagService;

/// Shared application state for the HTTP server.
pub struct AppState {
    /// Cache-aside evaluation and cache-invalidating administration.
    pub service: FlagService,
    /// Name of the evaluation cache backend, reported by /health.
    pub cache_backend: &'static str,
}
