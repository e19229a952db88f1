use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A stored feature flag.
///
/// `config` is an opaque payload owned by the caller; nothing in this crate
/// interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagRecord {
    pub key: String,
    pub enabled: bool,
    #[serde(default)]
    pub config: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating or updating a flag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlagRequest {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub config: Option<String>,
}

impl FlagRequest {
    pub fn new(key: &str, enabled: bool) -> Self {
        Self {
            key: key.to_string(),
            enabled,
            config: None,
        }
    }

    pub fn with_config(mut self, config: &str) -> Self {
        self.config = Some(config.to_string());
        self
    }
}

impl FlagRecord {
    /// Build a fresh record from a request, stamped with the current time.
    pub fn from_request(request: &FlagRequest) -> Self {
        Self {
            key: request.key.clone(),
            enabled: request.enabled,
            config: request.config.clone(),
            updated_at: Utc::now(),
        }
    }
}

/// Reject empty and whitespace-only flag keys.
pub fn validate_key(key: &str) -> Result<&str> {
    if key.trim().is_empty() {
        return Err(Error::BlankKey);
    }
    Ok(key)
}
