//! Client configuration: YAML file, environment overrides, defaults.
//!
//! Every field has a production default, so an empty document is a valid
//! config. Environment variables win over file values when
//! [`ClientConfig::apply_env`] is called:
//!
//! - `STORYBOARD_BASE_URL`
//! - `STORYBOARD_ENDPOINT_PATH`
//! - `STORYBOARD_API_KEY`
//! - `STORYBOARD_MODEL`
//! - `STORYBOARD_TIMEOUT_MS`
//! - `STORYBOARD_PROXY_URL`

use serde::{Deserialize, Deserializer, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::cache::CacheConfig;
use crate::error::{Error, ErrorContext};
use crate::pipeline::retry::{Backoff, RetryPolicy};
use crate::Result;

/// One retry layer. Inside [`ClientConfig`] a partial mapping only replaces
/// the fields it names; the rest come from that layer's own preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff: Backoff,
}

impl RetryConfig {
    /// Around each transport call: two extra attempts, linear backoff.
    pub fn local() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2000,
            backoff: Backoff::Linear,
        }
    }

    /// At the public entry point: three attempts, exponential backoff.
    pub fn outer() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            backoff: Backoff::Exponential,
        }
    }

    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            backoff: self.backoff,
        }
    }
}

#[derive(Deserialize)]
struct RetryOverride {
    max_attempts: Option<u32>,
    base_delay_ms: Option<u64>,
    backoff: Option<Backoff>,
}

impl RetryOverride {
    fn over(self, base: RetryConfig) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts.unwrap_or(base.max_attempts),
            base_delay_ms: self.base_delay_ms.unwrap_or(base.base_delay_ms),
            backoff: self.backoff.unwrap_or(base.backoff),
        }
    }
}

fn local_retry_fields<'de, D>(d: D) -> std::result::Result<RetryConfig, D::Error>
where
    D: Deserializer<'de>,
{
    RetryOverride::deserialize(d).map(|o| o.over(RetryConfig::local()))
}

fn outer_retry_fields<'de, D>(d: D) -> std::result::Result<RetryConfig, D::Error>
where
    D: Deserializer<'de>,
{
    RetryOverride::deserialize(d).map(|o| o.over(RetryConfig::outer()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub endpoint_path: String,
    /// Opaque bearer token. Never written back out.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub proxy_url: Option<String>,
    pub default_model: String,
    /// Used instead of `default_model` when a request carries images.
    pub vision_model: String,
    pub max_tokens: Option<u32>,
    pub temperature: f64,
    /// Per-attempt wall-clock limit.
    pub timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub pool_max_idle_per_host: usize,
    #[serde(deserialize_with = "local_retry_fields")]
    pub local_retry: RetryConfig,
    #[serde(deserialize_with = "outer_retry_fields")]
    pub outer_retry: RetryConfig,
    pub cache: CacheConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5173".to_string(),
            endpoint_path: "/api/proxy".to_string(),
            api_key: None,
            proxy_url: None,
            default_model: "qwen-plus".to_string(),
            vision_model: "qwen-vl-max".to_string(),
            max_tokens: Some(4000),
            temperature: 0.7,
            timeout_ms: 300_000,
            connect_timeout_ms: 10_000,
            pool_max_idle_per_host: 32,
            local_retry: RetryConfig::local(),
            outer_retry: RetryConfig::outer(),
            cache: CacheConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid config document: {}", e),
                ErrorContext::new().with_source("config_loader"),
            )
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read config file: {}", e),
                ErrorContext::new()
                    .with_details(path.display().to_string())
                    .with_source("config_loader"),
            )
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env();
        cfg
    }

    pub fn apply_env(&mut self) {
        if let Ok(v) = env::var("STORYBOARD_BASE_URL") {
            self.base_url = v;
        }
        if let Ok(v) = env::var("STORYBOARD_ENDPOINT_PATH") {
            self.endpoint_path = v;
        }
        if let Ok(v) = env::var("STORYBOARD_API_KEY") {
            if !v.trim().is_empty() {
                self.api_key = Some(v);
            }
        }
        if let Ok(v) = env::var("STORYBOARD_MODEL") {
            self.default_model = v;
        }
        if let Some(ms) = env::var("STORYBOARD_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|ms| *ms > 0)
        {
            self.timeout_ms = ms;
        }
        if let Ok(v) = env::var("STORYBOARD_PROXY_URL") {
            self.proxy_url = Some(v);
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Full URL of the completions endpoint.
    pub fn endpoint_url(&self) -> Result<Url> {
        let base = Url::parse(&self.base_url).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid base url: {}", e),
                ErrorContext::new()
                    .with_field_path("config.base_url")
                    .with_details(self.base_url.clone()),
            )
        })?;
        base.join(&self.endpoint_path).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid endpoint path: {}", e),
                ErrorContext::new()
                    .with_field_path("config.endpoint_path")
                    .with_details(self.endpoint_path.clone()),
            )
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.endpoint_url()?;
        if self.timeout_ms == 0 {
            return Err(Error::configuration_with_context(
                "timeout must be positive",
                ErrorContext::new().with_field_path("config.timeout_ms"),
            ));
        }
        if self.default_model.trim().is_empty() {
            return Err(Error::configuration_with_context(
                "default model must not be empty",
                ErrorContext::new().with_field_path("config.default_model"),
            ));
        }
        Ok(())
    }
}
