use std::env;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// Top-level flagcache.toml configuration
#[derive(Debug, Deserialize, Default)]
pub struct FlagcacheConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_hostname")]
    pub hostname: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Sled,
    Memory,
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage")]
    pub backend: StorageBackend,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    Memory,
    Redis,
}

#[derive(Debug, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_backend")]
    pub backend: CacheBackendKind,
    /// Evaluation cache TTL; must be at least one second.
    #[serde(
        default = "default_cache_ttl_secs",
        deserialize_with = "deserialize_ttl_secs"
    )]
    pub ttl_secs: u64,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Seconds between sweeps of expired in-process entries; 0 disables.
    #[serde(default = "default_purge_interval_secs")]
    pub purge_interval_secs: u64,
}

// ── Client-side (remote) config ─────────────────────

#[derive(Debug, Deserialize)]
pub struct RemoteConfig {
    pub url: Option<String>,
    #[serde(default = "default_client_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_client_timeout_secs")]
    pub read_timeout_secs: u64,
    #[serde(default = "default_client_max_entries")]
    pub cache_max_entries: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

// ── Default value functions ──────────────────────────

fn default_port() -> u16 {
    8080
}

fn default_hostname() -> String {
    "0.0.0.0".to_string()
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_storage() -> StorageBackend {
    StorageBackend::Sled
}

fn default_cache_backend() -> CacheBackendKind {
    CacheBackendKind::Memory
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn deserialize_ttl_secs<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let secs = u64::deserialize(deserializer)?;
    if secs == 0 {
        return Err(serde::de::Error::custom("cache ttl_secs must be at least 1"));
    }
    Ok(secs)
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_purge_interval_secs() -> u64 {
    60
}

fn default_client_timeout_secs() -> u64 {
    5
}

fn default_client_max_entries() -> u64 {
    1000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            hostname: default_hostname(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage(),
            data_dir: default_data_dir(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            ttl_secs: default_cache_ttl_secs(),
            redis_url: default_redis_url(),
            purge_interval_secs: default_purge_interval_secs(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: None,
            connect_timeout_secs: default_client_timeout_secs(),
            read_timeout_secs: default_client_timeout_secs(),
            cache_max_entries: default_client_max_entries(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl RemoteConfig {
    /// Client settings for the SDK, pointed at `url`.
    pub fn client_config(&self, url: &str) -> flagcache_lib::client::ClientConfig {
        flagcache_lib::client::ClientConfig::new(url)
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .read_timeout(Duration::from_secs(self.read_timeout_secs))
            .cache_max_entries(self.cache_max_entries)
            .cache_ttl(Duration::from_secs(self.cache_ttl_secs))
    }
}

impl FlagcacheConfig {
    /// Load configuration from a TOML file, falling back to defaults if the file
    /// doesn't exist or cannot be parsed.
    pub fn load(path: &str) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path, error = %e, "failed to parse config, using defaults");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| env::var(name).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // FLAGCACHE_PORT
        if let Some(port) = var("FLAGCACHE_PORT").and_then(|v| v.parse::<u16>().ok()) {
            self.server.port = port;
        }

        // FLAGCACHE_HOSTNAME
        if let Some(val) = var("FLAGCACHE_HOSTNAME") {
            self.server.hostname = val;
        }

        // FLAGCACHE_STORAGE
        if let Some(val) = var("FLAGCACHE_STORAGE") {
            match parse_storage(&val) {
                Some(backend) => self.storage.backend = backend,
                None => tracing::warn!(value = %val, "unknown FLAGCACHE_STORAGE value"),
            }
        }

        // FLAGCACHE_DATA_DIR
        if let Some(val) = var("FLAGCACHE_DATA_DIR") {
            self.storage.data_dir = val;
        }

        // FLAGCACHE_CACHE_BACKEND
        if let Some(val) = var("FLAGCACHE_CACHE_BACKEND") {
            match val.to_lowercase().as_str() {
                "memory" => self.cache.backend = CacheBackendKind::Memory,
                "redis" => self.cache.backend = CacheBackendKind::Redis,
                other => tracing::warn!(value = %other, "unknown FLAGCACHE_CACHE_BACKEND value"),
            }
        }

        // FLAGCACHE_CACHE_TTL_SECS
        if let Some(val) = var("FLAGCACHE_CACHE_TTL_SECS") {
            match val.parse::<u64>() {
                Ok(ttl) if ttl > 0 => self.cache.ttl_secs = ttl,
                _ => tracing::warn!(value = %val, "invalid FLAGCACHE_CACHE_TTL_SECS value"),
            }
        }

        // FLAGCACHE_REDIS_URL
        if let Some(val) = var("FLAGCACHE_REDIS_URL") {
            self.cache.redis_url = val;
        }

        // FLAGCACHE_REMOTE
        if let Some(val) = var("FLAGCACHE_REMOTE") {
            self.remote.url = Some(val);
        }
    }
}

pub fn parse_storage(value: &str) -> Option<StorageBackend> {
    match value.to_lowercase().as_str() {
        "sled" => Some(StorageBackend::Sled),
        "memory" => Some(StorageBackend::Memory),
        _ => None,
    }
}
