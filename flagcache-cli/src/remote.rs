use std::process;

use flagcache_lib::client::FlagClient;
use flagcache_lib::{FlagRecord, FlagRequest};
use reqwest::{StatusCode, Url};

use crate::server::config::{FlagcacheConfig, RemoteConfig};

/// Load the [remote] section from the config file, with env overrides applied.
pub fn load_remote_config(config_path: &str) -> RemoteConfig {
    let mut config = FlagcacheConfig::load(config_path);
    config.apply_env_overrides();
    config.remote
}

/// Resolve the remote URL from: CLI arg > env var > config file
pub fn resolve_remote_url(remote_arg: Option<&str>, config: &RemoteConfig) -> String {
    match remote_arg.map(String::from).or_else(|| config.url.clone()) {
        Some(url) => url.trim_end_matches('/').to_string(),
        None => {
            eprintln!(
                "No remote URL specified. Use --remote, set FLAGCACHE_REMOTE, or configure [remote] in the config file"
            );
            process::exit(1);
        }
    }
}

/// `{remote}/flags`, or `{remote}/flags/{key}` with the key encoded as a
/// single path segment.
fn flags_url(remote: &str, key: Option<&str>) -> Result<Url, String> {
    let mut url =
        Url::parse(remote).map_err(|e| format!("invalid remote url '{}': {}", remote, e))?;
    url.path_segments_mut()
        .map_err(|_| format!("invalid remote url '{}'", remote))?
        .pop_if_empty()
        .push("flags")
        .extend(key);
    Ok(url)
}

fn fail(action: &str, err: impl std::fmt::Display) -> ! {
    eprintln!("Failed to {}: {}", action, err);
    process::exit(1);
}

async fn expect_success(response: reqwest::Response, action: &str) -> reqwest::Response {
    if response.status().is_success() {
        return response;
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    eprintln!("Failed to {} ({}): {}", action, status, body);
    process::exit(1);
}

fn print_flag(flag: &FlagRecord) {
    let state = if flag.enabled { "on " } else { "off" };
    match &flag.config {
        Some(config) => println!("{} {}  {}  {}", state, flag.key, flag.updated_at.to_rfc3339(), config),
        None => println!("{} {}  {}", state, flag.key, flag.updated_at.to_rfc3339()),
    }
}

// ── Admin commands ──────────────────────────────────────────

pub async fn run_list(remote: &str) {
    let url = flags_url(remote, None).unwrap_or_else(|e| fail("build request url", e));
    let response = reqwest::get(url)
        .await
        .unwrap_or_else(|e| fail("list flags", e));
    let flags: Vec<FlagRecord> = expect_success(response, "list flags")
        .await
        .json()
        .await
        .unwrap_or_else(|e| fail("decode flag list", e));

    if flags.is_empty() {
        println!("No flags defined");
        return;
    }
    for flag in &flags {
        print_flag(flag);
    }
}

pub async fn run_get(remote: &str, key: &str) {
    let url = flags_url(remote, Some(key)).unwrap_or_else(|e| fail("build request url", e));
    let response = reqwest::get(url)
        .await
        .unwrap_or_else(|e| fail("get flag", e));
    if response.status() == StatusCode::NOT_FOUND {
        eprintln!("Flag {} not found", key);
        process::exit(1);
    }
    let flag: FlagRecord = expect_success(response, "get flag")
        .await
        .json()
        .await
        .unwrap_or_else(|e| fail("decode flag", e));
    print_flag(&flag);
}

pub async fn run_create(remote: &str, request: FlagRequest) {
    let url = flags_url(remote, None).unwrap_or_else(|e| fail("build request url", e));
    let response = reqwest::Client::new()
        .post(url)
        .json(&request)
        .send()
        .await
        .unwrap_or_else(|e| fail("create flag", e));
    let flag: FlagRecord = expect_success(response, "create flag")
        .await
        .json()
        .await
        .unwrap_or_else(|e| fail("decode flag", e));
    println!("✓ Created {}", flag.key);
}

pub async fn run_update(remote: &str, request: FlagRequest) {
    let url = flags_url(remote, Some(&request.key))
        .unwrap_or_else(|e| fail("build request url", e));
    let response = reqwest::Client::new()
        .put(url)
        .json(&request)
        .send()
        .await
        .unwrap_or_else(|e| fail("update flag", e));
    if response.status() == StatusCode::NOT_FOUND {
        eprintln!("Flag {} not found", request.key);
        process::exit(1);
    }
    let flag: FlagRecord = expect_success(response, "update flag")
        .await
        .json()
        .await
        .unwrap_or_else(|e| fail("decode flag", e));
    println!("✓ Updated {} (enabled: {})", flag.key, flag.enabled);
}

pub async fn run_delete(remote: &str, key: &str) {
    let url = flags_url(remote, Some(key)).unwrap_or_else(|e| fail("build request url", e));
    let response = reqwest::Client::new()
        .delete(url)
        .send()
        .await
        .unwrap_or_else(|e| fail("delete flag", e));
    if response.status() == StatusCode::NOT_FOUND {
        eprintln!("Flag {} not found", key);
        process::exit(1);
    }
    expect_success(response, "delete flag").await;
    println!("✓ Deleted {}", key);
}

// ── Evaluation through the SDK client ───────────────────────

/// Evaluate a flag the way an embedding application would: through the
/// caching SDK client, falling back to `default_value` if the server cannot
/// answer.
pub async fn run_eval(
    config: RemoteConfig,
    remote: String,
    key: String,
    target: Option<String>,
    default_value: bool,
) {
    let client_config = config.client_config(&remote).default_value(default_value);

    // The SDK client is blocking and must not run on a runtime worker.
    let result = tokio::task::spawn_blocking(move || {
        let client = FlagClient::new(client_config)?;
        Ok::<bool, String>(client.is_enabled(&key, target.as_deref(), default_value))
    })
    .await;

    match result {
        Ok(Ok(enabled)) => println!("{}", enabled),
        Ok(Err(e)) => fail("create client", e),
        Err(e) => fail("evaluate flag", e),
    }
}
