use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::types::{CallState, ChunkHandler};
use crate::cache::{CacheKind, ResponseCache};
use crate::config::ClientConfig;
use crate::pipeline::retry::RetryPolicy;
use crate::tokens::TokenCounter;
use crate::transport::HttpTransport;
use crate::types::{ContentPart, GenerationRequest, GenerationResult, Usage};
use crate::usage::{UsageRecord, UsageRecorder};
use crate::Result;

/// Client for the generation service.
///
/// Cheap to share behind an `Arc`; concurrent calls each own their timer and
/// cancellation scope and share only the cache.
pub struct GenerationClient {
    pub(crate) config: ClientConfig,
    pub(crate) transport: Arc<HttpTransport>,
    pub(crate) local_retry: RetryPolicy,
    pub(crate) outer_retry: RetryPolicy,
    pub(crate) cache: Arc<ResponseCache>,
    pub(crate) recorder: Arc<dyn UsageRecorder>,
    pub(crate) token_counter: Arc<dyn TokenCounter>,
}

fn into_state(state: Mutex<CallState<'_>>) -> CallState<'_> {
    state.into_inner().unwrap_or_else(|p| p.into_inner())
}

impl GenerationClient {
    /// Create a client from config with default collaborators.
    pub fn new(config: ClientConfig) -> Result<Self> {
        crate::client::builder::GenerationClientBuilder::from_config(config).build()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Single-turn request using the configured defaults. The vision model
    /// is selected when any image is attached.
    pub fn request_for(&self, prompt: impl Into<String>, images: Vec<ContentPart>) -> GenerationRequest {
        let req = if images.is_empty() {
            GenerationRequest::text(self.config.default_model.clone(), prompt)
        } else {
            GenerationRequest::with_images(self.config.vision_model.clone(), prompt, images)
        };
        let req = req.temperature(self.config.temperature);
        match self.config.max_tokens {
            Some(n) => req.max_tokens(n),
            None => req.unbounded(),
        }
    }

    fn prepare(request: &GenerationRequest) -> Result<(GenerationRequest, Value)> {
        request.validate()?;
        let clean = request.sanitized();
        let body = clean.to_wire()?;
        Ok((clean, body))
    }

    /// One exchange with no retry.
    ///
    /// With `stream` set on the request, each non-empty delta goes to
    /// `on_chunk` in arrival order and the result holds their concatenation.
    /// Otherwise the body is parsed once and `on_chunk` is never called.
    /// An already-cancelled token fails before any network activity.
    pub async fn send(
        &self,
        request: &GenerationRequest,
        on_chunk: Option<&mut dyn ChunkHandler>,
        cancel: Option<&CancellationToken>,
        timeout: Duration,
    ) -> Result<GenerationResult> {
        let (clean, body) = Self::prepare(request)?;
        let request_id = Uuid::new_v4().to_string();
        let state = Mutex::new(CallState::new(on_chunk));
        self.execute_once(&body, clean.is_stream(), &state, cancel, timeout, &request_id)
            .await?;
        Ok(into_state(state).finish(true))
    }

    /// Full entry point: outer retry around local retry around [`send`].
    ///
    /// A usage record is reported whether the call succeeds or fails. On
    /// failure the record carries whatever content arrived before it.
    ///
    /// [`send`]: GenerationClient::send
    pub async fn generate(
        &self,
        kind: &str,
        request: &GenerationRequest,
        on_chunk: Option<&mut dyn ChunkHandler>,
        cancel: Option<&CancellationToken>,
    ) -> Result<GenerationResult> {
        let (clean, body) = Self::prepare(request)?;
        let request_id = Uuid::new_v4().to_string();
        let start = Instant::now();

        let state = Mutex::new(CallState::new(on_chunk));
        let outcome = self
            .execute_with_retry(
                &body,
                clean.is_stream(),
                &state,
                cancel,
                self.config.timeout(),
                &request_id,
            )
            .await;
        let result = into_state(state).finish(outcome.is_ok());

        info!(
            kind,
            model = clean.model(),
            request_id = request_id.as_str(),
            status = result.status.as_str(),
            content_len = result.content.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "generation finished"
        );
        self.record_usage(kind, &clean, &result, &request_id).await;

        outcome.map(|()| result)
    }

    /// Non-streaming generation memoized in the generation cache under
    /// `params`. Only the text is cached.
    pub async fn generate_cached<P: Serialize + ?Sized>(
        &self,
        kind: &str,
        params: &P,
        request: &GenerationRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<String> {
        if let Some(text) = self
            .cache
            .get(CacheKind::Generation, params)
            .and_then(|v| v.as_str().map(str::to_string))
        {
            debug!(kind, "generation served from cache");
            return Ok(text);
        }
        let request = request.clone().stream(false);
        let result = self.generate(kind, &request, None, cancel).await?;
        self.cache.set(
            CacheKind::Generation,
            params,
            Value::String(result.content.clone()),
        );
        Ok(result.content)
    }

    /// Like [`generate_cached`] but keyed by free text, for analysis and
    /// visualization results of a script.
    ///
    /// [`generate_cached`]: GenerationClient::generate_cached
    pub async fn analyze_cached(
        &self,
        cache_kind: CacheKind,
        text: &str,
        request: &GenerationRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<String> {
        if let Some(hit) = self
            .cache
            .get_text(cache_kind, text)
            .and_then(|v| v.as_str().map(str::to_string))
        {
            debug!(kind = cache_kind.namespace(), "analysis served from cache");
            return Ok(hit);
        }
        let request = request.clone().stream(false);
        let result = self
            .generate(cache_kind.namespace(), &request, None, cancel)
            .await?;
        self.cache
            .set_text(cache_kind, text, Value::String(result.content.clone()));
        Ok(result.content)
    }

    async fn record_usage(
        &self,
        kind: &str,
        request: &GenerationRequest,
        result: &GenerationResult,
        request_id: &str,
    ) {
        let (usage, estimated) = match result.usage {
            Some(u) => (u, false),
            None => (
                Usage::new(
                    self.token_counter.count_messages(request.messages()) as u64,
                    self.token_counter.count(&result.content) as u64,
                ),
                true,
            ),
        };
        let record = UsageRecord::new(kind, request.model(), request_id, result.status)
            .with_echo(request.prompt_text(), result.content.clone())
            .with_usage(usage, estimated);
        if let Err(e) = self.recorder.record(record).await {
            warn!(request_id, error = %e, "usage recorder failed");
        }
    }
}
