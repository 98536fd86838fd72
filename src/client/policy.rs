use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::core::GenerationClient;
use super::types::{lock_state, CallState};
use crate::pipeline::retry::{classify, RetryDecision};
use crate::{Error, Result};

/// Retry classification that also refuses once the handler has seen text,
/// so a caller is never handed the same delta twice.
pub(crate) fn guarded_classify(state: &Mutex<CallState<'_>>, err: &Error) -> RetryDecision {
    if lock_state(state).delivered {
        debug!(error = %err, "output already delivered, not retrying");
        return RetryDecision::Stop;
    }
    classify(err)
}

impl GenerationClient {
    /// Local retry around one transport call: linear backoff, each attempt
    /// with its own timeout.
    pub(crate) async fn execute_with_local_retry(
        &self,
        body: &serde_json::Value,
        stream: bool,
        state: &Mutex<CallState<'_>>,
        cancel: Option<&CancellationToken>,
        timeout: Duration,
        request_id: &str,
    ) -> Result<()> {
        self.local_retry
            .execute(
                move |attempt| {
                    debug!(attempt, request_id, "local attempt");
                    self.execute_once(body, stream, state, cancel, timeout, request_id)
                },
                move |e| guarded_classify(state, e),
                cancel,
            )
            .await
    }

    /// Outer retry at the entry point. It only sees whether the whole local
    /// loop succeeded, never how many local attempts were made.
    pub(crate) async fn execute_with_retry(
        &self,
        body: &serde_json::Value,
        stream: bool,
        state: &Mutex<CallState<'_>>,
        cancel: Option<&CancellationToken>,
        timeout: Duration,
        request_id: &str,
    ) -> Result<()> {
        self.outer_retry
            .execute(
                move |attempt| {
                    debug!(attempt, request_id, "outer attempt");
                    self.execute_with_local_retry(body, stream, state, cancel, timeout, request_id)
                },
                move |e| guarded_classify(state, e),
                cancel,
            )
            .await
    }
}
