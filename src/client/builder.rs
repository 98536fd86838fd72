use crate::cache::{Clock, ResponseCache, SystemClock};
use crate::client::core::GenerationClient;
use crate::config::ClientConfig;
use crate::pipeline::retry::RetryPolicy;
use crate::tokens::{CjkAwareEstimator, TokenCounter};
use crate::transport::HttpTransport;
use crate::usage::{noop_recorder, UsageRecorder};
use crate::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Builder for [`GenerationClient`].
///
/// Everything not set explicitly comes from the [`ClientConfig`]; a shared
/// cache, usage recorder, token counter and clock can be injected.
pub struct GenerationClientBuilder {
    config: ClientConfig,
    local_retry: Option<RetryPolicy>,
    outer_retry: Option<RetryPolicy>,
    cache: Option<Arc<ResponseCache>>,
    clock: Arc<dyn Clock>,
    recorder: Arc<dyn UsageRecorder>,
    token_counter: Arc<dyn TokenCounter>,
}

impl GenerationClientBuilder {
    pub fn new() -> Self {
        Self::from_config(ClientConfig::default())
    }

    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            local_retry: None,
            outer_retry: None,
            cache: None,
            clock: Arc::new(SystemClock),
            recorder: noop_recorder(),
            token_counter: Arc::new(CjkAwareEstimator::new()),
        }
    }

    /// Defaults with `STORYBOARD_*` environment overrides.
    pub fn from_env() -> Self {
        Self::from_config(ClientConfig::from_env())
    }

    /// YAML config file, then environment overrides on top.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = ClientConfig::from_path(path)?;
        config.apply_env();
        Ok(Self::from_config(config))
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    pub fn endpoint_path(mut self, path: impl Into<String>) -> Self {
        self.config.endpoint_path = path.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    /// Per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn local_retry(mut self, policy: RetryPolicy) -> Self {
        self.local_retry = Some(policy);
        self
    }

    pub fn outer_retry(mut self, policy: RetryPolicy) -> Self {
        self.outer_retry = Some(policy);
        self
    }

    /// Share one cache between several clients.
    pub fn cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Time source for a cache built from config. Ignored with [`Self::cache`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn usage_recorder(mut self, recorder: Arc<dyn UsageRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.token_counter = counter;
        self
    }

    pub fn build(self) -> Result<GenerationClient> {
        self.config.validate()?;
        let transport = Arc::new(HttpTransport::new(&self.config)?);
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(ResponseCache::with_clock(&self.config.cache, self.clock)));

        Ok(GenerationClient {
            local_retry: self
                .local_retry
                .unwrap_or_else(|| self.config.local_retry.to_policy()),
            outer_retry: self
                .outer_retry
                .unwrap_or_else(|| self.config.outer_retry.to_policy()),
            transport,
            cache,
            recorder: self.recorder,
            token_counter: self.token_counter,
            config: self.config,
        })
    }
}

impl Default for GenerationClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
