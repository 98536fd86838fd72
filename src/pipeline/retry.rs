//! Retry Operator
//!
//! Repeats a failing operation with backoff. The operator knows nothing about
//! HTTP; a classifier decides whether a given failure is worth another attempt.
//!
//! Two policies compose on the streaming path: a local one around each
//! transport call (linear backoff) and an outer one at the public entry point
//! (exponential backoff). The outer policy only sees the local policy's final
//! outcome, so the worst case is `outer.max_attempts * local.max_attempts`
//! network attempts for one logical call.

use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{Error, Result};

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// `base * 2^attempt`, no jitter
    Exponential,
    /// `base * (attempt + 1)`
    Linear,
}

/// Classifier verdict for one failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    Stop,
}

/// Default classifier: retry exactly the retryable error classes.
pub fn classify(error: &Error) -> RetryDecision {
    if error.is_retryable() {
        RetryDecision::Retry
    } else {
        RetryDecision::Stop
    }
}

/// A failed attempt that is about to be retried.
#[derive(Debug)]
pub struct RetryAttempt<'a> {
    /// Zero-based index of the attempt that failed.
    pub index: u32,
    pub last_error: &'a Error,
    /// Wait before the next attempt starts.
    pub delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero behaves as one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn exponential(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff: Backoff::Exponential,
        }
    }

    pub fn linear(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff: Backoff::Linear,
        }
    }

    /// A policy that runs the operation once.
    pub fn none() -> Self {
        Self::exponential(1, Duration::ZERO)
    }

    /// Delay after the zero-based `attempt` failed.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = match self.backoff {
            Backoff::Exponential => 1u32.checked_shl(attempt).unwrap_or(u32::MAX),
            Backoff::Linear => attempt.saturating_add(1),
        };
        self.base_delay.saturating_mul(factor)
    }

    /// Run `operation` until it succeeds, the classifier says stop, or the
    /// attempt budget is spent. The last error is returned unchanged.
    ///
    /// `operation` receives the zero-based attempt index. Cancellation is
    /// checked before each retry delay and also interrupts the delay itself.
    pub async fn execute<T, F, Fut, C>(
        &self,
        mut operation: F,
        classify: C,
        cancel: Option<&CancellationToken>,
    ) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
        C: Fn(&Error) -> RetryDecision,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt: u32 = 0;
        loop {
            let err = match operation(attempt).await {
                Ok(v) => return Ok(v),
                Err(e) => e,
            };

            if attempt + 1 >= max_attempts {
                debug!(attempts = attempt + 1, error = %err, "retry budget exhausted");
                return Err(err);
            }
            if classify(&err) == RetryDecision::Stop {
                debug!(attempt, error = %err, "failure is not retryable");
                return Err(err);
            }

            let next = RetryAttempt {
                index: attempt,
                last_error: &err,
                delay: self.delay_for_attempt(attempt),
            };
            warn!(
                attempt = next.index + 1,
                max_attempts,
                delay_ms = next.delay.as_millis() as u64,
                error = %next.last_error,
                "attempt failed, retrying"
            );

            match cancel {
                Some(token) => {
                    if token.is_cancelled() {
                        return Err(Error::Cancelled);
                    }
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => return Err(Error::Cancelled),
                        _ = tokio::time::sleep(next.delay) => {}
                    }
                }
                None => tokio::time::sleep(next.delay).await,
            }
            attempt += 1;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(3, Duration::from_millis(1000))
    }
}
