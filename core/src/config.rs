//! Client configuration: service location and credentials.
//!
//! A config can come from code, a JSON file, or the environment
//! (`CAPTCHATRADER_*` variables overlay whatever is already set).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::request_type::DEFAULT_BASE_URL;

pub const ENV_BASE_URL: &str = "CAPTCHATRADER_BASE_URL";
pub const ENV_API_KEY: &str = "CAPTCHATRADER_API_KEY";
pub const ENV_USERNAME: &str = "CAPTCHATRADER_USERNAME";
pub const ENV_PASSWORD: &str = "CAPTCHATRADER_PASSWORD";

/// Account credentials. Absent values are simply not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(api_key: Option<&str>, username: Option<&str>, password: Option<&str>) -> Self {
        Self {
            api_key: api_key.map(str::to_string),
            username: username.map(str::to_string),
            password: password.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub credentials: Credentials,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            credentials: Credentials::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials: Credentials::default(),
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Load a config from a JSON file such as
    /// `{"base_url": "...", "credentials": {"username": "..."}}`.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let mut config: ClientConfig = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(config)
    }

    /// Defaults overlaid with the `CAPTCHATRADER_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Overlay values from `lookup`, keyed by the `CAPTCHATRADER_*` names.
    /// Empty values are ignored.
    pub fn overlay<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());
        if let Some(base_url) = get(ENV_BASE_URL) {
            self.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(api_key) = get(ENV_API_KEY) {
            self.credentials.api_key = Some(api_key);
        }
        if let Some(username) = get(ENV_USERNAME) {
            self.credentials.username = Some(username);
        }
        if let Some(password) = get(ENV_PASSWORD) {
            self.credentials.password = Some(password);
        }
        self
    }
}
