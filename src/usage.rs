//! 用量记录模块：每次生成调用结束（成功或失败）后上报一条用量记录。
//!
//! Usage recording.
//!
//! The client reports one [`UsageRecord`] per completed logical call. What a
//! recorder does with it (billing ledger, metrics, nothing) is up to the
//! application. A recorder failure is logged by the client and never fails
//! the call it describes.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`UsageRecorder`] | Async trait for usage destinations |
//! | [`NoopUsageRecorder`] | Default, discards records |
//! | [`InMemoryUsageRecorder`] | Bounded in-memory log, for tests and dashboards |
//! | [`TracingUsageRecorder`] | Emits each record as a `tracing` event |

use crate::types::{CallStatus, Usage};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

fn timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// One completed call as seen by the usage collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Caller-chosen category, e.g. `"script"` or `"analysis"`.
    pub kind: String,
    pub model: String,
    pub prompt_echo: String,
    /// Accumulated content; partial when the call failed mid-stream.
    pub response_echo: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub status: CallStatus,
    /// Whether the counts came from the service or from an estimator.
    pub estimated: bool,
    pub request_id: String,
    pub timestamp: f64,
}

impl UsageRecord {
    pub fn new(
        kind: impl Into<String>,
        model: impl Into<String>,
        request_id: impl Into<String>,
        status: CallStatus,
    ) -> Self {
        Self {
            kind: kind.into(),
            model: model.into(),
            prompt_echo: String::new(),
            response_echo: String::new(),
            input_tokens: 0,
            output_tokens: 0,
            status,
            estimated: false,
            request_id: request_id.into(),
            timestamp: timestamp(),
        }
    }

    pub fn with_echo(mut self, prompt: impl Into<String>, response: impl Into<String>) -> Self {
        self.prompt_echo = prompt.into();
        self.response_echo = response.into();
        self
    }

    pub fn with_usage(mut self, usage: Usage, estimated: bool) -> Self {
        self.input_tokens = usage.input_tokens;
        self.output_tokens = usage.output_tokens;
        self.estimated = estimated;
        self
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

#[async_trait]
pub trait UsageRecorder: Send + Sync {
    async fn record(&self, record: UsageRecord) -> Result<()>;
}

/// Discards every record.
pub struct NoopUsageRecorder;

#[async_trait]
impl UsageRecorder for NoopUsageRecorder {
    async fn record(&self, _: UsageRecord) -> Result<()> {
        Ok(())
    }
}

pub fn noop_recorder() -> Arc<dyn UsageRecorder> {
    Arc::new(NoopUsageRecorder)
}

/// Keeps the newest `max_records` records.
pub struct InMemoryUsageRecorder {
    records: Mutex<VecDeque<UsageRecord>>,
    max_records: usize,
}

impl InMemoryUsageRecorder {
    pub fn new(max: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            max_records: max.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<UsageRecord>> {
        self.records.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn records(&self) -> Vec<UsageRecord> {
        self.lock().iter().cloned().collect()
    }

    pub fn records_by_kind(&self, kind: &str) -> Vec<UsageRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.kind == kind)
            .collect()
    }

    pub fn total_tokens(&self) -> u64 {
        self.records().iter().map(UsageRecord::total_tokens).sum()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryUsageRecorder {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl UsageRecorder for InMemoryUsageRecorder {
    async fn record(&self, record: UsageRecord) -> Result<()> {
        let mut records = self.lock();
        records.push_back(record);
        while records.len() > self.max_records {
            records.pop_front();
        }
        Ok(())
    }
}

/// Logs each record at info level under the `usage` target.
#[derive(Debug, Default)]
pub struct TracingUsageRecorder;

#[async_trait]
impl UsageRecorder for TracingUsageRecorder {
    async fn record(&self, record: UsageRecord) -> Result<()> {
        tracing::info!(
            target: "usage",
            kind = record.kind.as_str(),
            model = record.model.as_str(),
            status = record.status.as_str(),
            input_tokens = record.input_tokens,
            output_tokens = record.output_tokens,
            estimated = record.estimated,
            request_id = record.request_id.as_str(),
            "generation usage"
        );
        Ok(())
    }
}
