// File: livelist-sync/src/config.rs
// Purpose: Configuration parsing from livelist.toml with environment overrides

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "livelist.toml";

pub const ENV_API_BASE_URL: &str = "LIVELIST_API_BASE_URL";
pub const ENV_API_TOKEN: &str = "LIVELIST_API_TOKEN";
pub const ENV_PUSH_URL: &str = "LIVELIST_PUSH_URL";

/// Path appended to the API host when no push URL is configured
const DEFAULT_PUSH_PATH: &str = "/ws/";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct LiveListConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub push: PushConfig,

    #[serde(default)]
    pub view: ViewConfig,
}

/// REST backend access
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token sent with every request
    #[serde(default)]
    pub token: Option<String>,

    /// Deadline for a single request attempt
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra attempts after the first one for page loads
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First retry delay; doubles on each further attempt
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

/// Push notification channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushConfig {
    /// WebSocket URL; derived from `api.base_url` when absent
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    /// 0 means retry forever
    #[serde(default)]
    pub max_reconnect_attempts: u32,

    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,
}

/// What to do with a page load that completes after a newer one started
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StaleResponsePolicy {
    /// Only the most recently started load may populate the list
    #[default]
    Discard,
    /// Whichever load resolves last populates the list
    LastResolvedWins,
}

/// Per-view defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViewConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default)]
    pub stale_responses: StaleResponsePolicy,
}

// Default values
fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_bus_capacity() -> usize {
    crate::bus::DEFAULT_BUS_CAPACITY
}

fn default_page_size() -> u32 {
    10
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            url: None,
            reconnect_delay_secs: default_reconnect_delay_secs(),
            max_reconnect_attempts: 0,
            bus_capacity: default_bus_capacity(),
        }
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            stale_responses: StaleResponsePolicy::default(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

impl PushConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

impl LiveListConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing or empty file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: LiveListConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Load `./livelist.toml`, then apply `LIVELIST_*` environment overrides
    pub fn load_default() -> Result<Self> {
        let mut config = Self::load(DEFAULT_CONFIG_FILE)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override connection settings from the environment.
    ///
    /// Takes the lookup as a function so callers (and tests) control the source.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(base_url) = non_empty(ENV_API_BASE_URL) {
            self.api.base_url = base_url;
        }
        if let Some(token) = non_empty(ENV_API_TOKEN) {
            self.api.token = Some(token);
        }
        if let Some(url) = non_empty(ENV_PUSH_URL) {
            self.push.url = Some(url);
        }
    }

    /// Push URL, falling back to the API host with a `ws`/`wss` scheme
    pub fn push_url(&self) -> String {
        if let Some(url) = &self.push.url {
            return url.clone();
        }
        let base = self.api.base_url.trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };
        format!("{}{}", base, DEFAULT_PUSH_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = LiveListConfig::default();
        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert_eq!(config.api.timeout(), Duration::from_secs(10));
        assert_eq!(config.api.max_retries, 2);
        assert_eq!(config.push.reconnect_delay(), Duration::from_secs(5));
        assert_eq!(config.push.bus_capacity, 1000);
        assert_eq!(config.view.page_size, 10);
        assert_eq!(config.view.stale_responses, StaleResponsePolicy::Discard);
    }

    #[test]
    fn test_empty_config() {
        let config = toml::from_str::<LiveListConfig>("").unwrap_or_default();
        assert_eq!(config, LiveListConfig::default());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = LiveListConfig::load("/definitely/not/here/livelist.toml").unwrap();
        assert_eq!(config, LiveListConfig::default());
    }

    #[test]
    fn test_partial_sections() {
        let toml = r#"
            [api]
            base_url = "https://api.example.com"
            max_retries = 0

            [view]
            page_size = 50
            stale_responses = "last_resolved_wins"
        "#;
        let config: LiveListConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.api.base_url, "https://api.example.com");
        assert_eq!(config.api.max_retries, 0);
        assert_eq!(config.api.timeout_secs, 10);
        assert_eq!(config.view.page_size, 50);
        assert_eq!(config.view.stale_responses, StaleResponsePolicy::LastResolvedWins);
        assert_eq!(config.push, PushConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_API_BASE_URL, "https://prod.example.com"),
            (ENV_API_TOKEN, "secret"),
            (ENV_PUSH_URL, "   "),
        ]
        .into_iter()
        .collect();

        let mut config = LiveListConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.api.base_url, "https://prod.example.com");
        assert_eq!(config.api.token.as_deref(), Some("secret"));
        // Blank values are ignored
        assert_eq!(config.push.url, None);
    }

    #[test]
    fn test_push_url_derivation() {
        let mut config = LiveListConfig::default();
        config.api.base_url = "https://api.example.com/".to_string();
        assert_eq!(config.push_url(), "wss://api.example.com/ws/");

        config.push.url = Some("ws://localhost:9000/notifications".to_string());
        assert_eq!(config.push_url(), "ws://localhost:9000/notifications");
    }
}
