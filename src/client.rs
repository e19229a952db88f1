//! Blocking SDK client for the evaluation endpoint.
//!
//! Results are kept in a bounded, TTL-limited in-process cache. The client
//! never raises on evaluation: transport errors, timeouts, non-success
//! statuses and malformed bodies all resolve to the caller's default, and that
//! default is cached so an unhealthy server is not hit again for the same key
//! until the entry expires.
//!
//! # Examples
//! ```no_run
//! use flagcache_lib::client::{ClientConfig, FlagClient};
//!
//! let client = FlagClient::new(ClientConfig::new("http://flags.internal:8080")).unwrap();
//! if client.is_enabled("new-checkout", Some("user-42"), false) {
//!     // ...
//! }
//! ```

use std::time::Duration;

use moka::sync::Cache;
use reqwest::blocking::Client;
use reqwest::Url;
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_MAX_ENTRIES: u64 = 1000;
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Upper bound on the whole request, response body included.
    pub read_timeout: Duration,
    pub cache_max_entries: u64,
    pub cache_ttl: Duration,
    /// Fallback used by [`FlagClient::is_enabled_or_default`].
    pub default_value: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: DEFAULT_TIMEOUT,
            read_timeout: DEFAULT_TIMEOUT,
            cache_max_entries: DEFAULT_MAX_ENTRIES,
            cache_ttl: DEFAULT_CACHE_TTL,
            default_value: false,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            ..Self::default()
        }
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Zero keeps the default.
    pub fn cache_max_entries(mut self, max: u64) -> Self {
        if max > 0 {
            self.cache_max_entries = max;
        }
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn default_value(mut self, value: bool) -> Self {
        self.default_value = value;
        self
    }
}

/// Why a remote evaluation produced no usable answer. Never surfaced to
/// callers of [`FlagClient::is_enabled`].
#[derive(Error, Debug)]
enum FetchError {
    #[error("invalid url: {0}")]
    Url(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed response body: {0}")]
    Body(#[from] serde_json::Error),
}

pub struct FlagClient {
    http: Client,
    base_url: Url,
    cache: Cache<String, bool>,
    config: ClientConfig,
}

impl FlagClient {
    /// Build a client. Fails only if the base URL cannot be parsed or the
    /// HTTP client cannot be constructed.
    pub fn new(config: ClientConfig) -> Result<Self, String> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| format!("invalid base url '{}': {}", config.base_url, e))?;
        if base_url.cannot_be_a_base() {
            return Err(format!("invalid base url '{}'", config.base_url));
        }

        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.read_timeout)
            .build()
            .map_err(|e| format!("failed to build http client: {}", e))?;

        let cache = Cache::builder()
            .max_capacity(config.cache_max_entries)
            .time_to_live(config.cache_ttl)
            .build();

        Ok(Self {
            http,
            base_url,
            cache,
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Evaluate `flag_key`, answering from the local cache when possible.
    ///
    /// A blank key returns `default_value` without any cache or network
    /// access. Any failure to obtain a boolean from the server caches and
    /// returns `default_value`.
    pub fn is_enabled(&self, flag_key: &str, target_id: Option<&str>, default_value: bool) -> bool {
        if flag_key.trim().is_empty() {
            return default_value;
        }

        if let Some(cached) = self.cache.get(flag_key) {
            return cached;
        }

        let value = match self.fetch(flag_key, target_id) {
            Ok(enabled) => enabled,
            Err(e) => {
                tracing::warn!(flag = %flag_key, error = %e, default_value, "flag evaluation failed, using default");
                default_value
            }
        };
        self.cache.insert(flag_key.to_string(), value);
        value
    }

    /// [`FlagClient::is_enabled`] with the configured default value.
    pub fn is_enabled_or_default(&self, flag_key: &str, target_id: Option<&str>) -> bool {
        self.is_enabled(flag_key, target_id, self.config.default_value)
    }

    /// Drop the cached value for one flag, if any.
    pub fn invalidate_flag(&self, flag_key: &str) {
        self.cache.invalidate(flag_key);
    }

    /// Drop every cached value.
    pub fn clear_cache(&self) {
        self.cache.invalidate_all();
    }

    /// Number of cached flag values once pending evictions have been applied.
    pub fn cached_entries(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    fn eval_url(&self, flag_key: &str, target_id: Option<&str>) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::Url(self.config.base_url.clone()))?
            .pop_if_empty()
            .extend(["flags", "evaluate", flag_key]);
        if let Some(target) = target_id.filter(|t| !t.trim().is_empty()) {
            url.query_pairs_mut().append_pair("targetId", target);
        }
        Ok(url)
    }

    fn fetch(&self, flag_key: &str, target_id: Option<&str>) -> Result<bool, FetchError> {
        let url = self.eval_url(flag_key, target_id)?;
        let response = self.http.get(url).send()?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }
        let body = response.text()?;
        Ok(serde_json::from_str::<bool>(body.trim())?)
    }
}
