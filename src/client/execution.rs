//! 请求执行逻辑：单次网络交换，超时与取消竞速。
//!
//! Request execution logic (single attempt). Retry loops live in `policy`.

use bytes::BytesMut;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio_util::codec::Decoder;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::core::GenerationClient;
use super::error_classification::remote_error;
use super::types::{lock_state, CallState};
use crate::pipeline::decode::{parse_document, SseLineCodec};
use crate::transport::TransportError;
use crate::types::Frame;
use crate::{Error, Result};

pub(crate) fn is_cancelled(cancel: Option<&CancellationToken>) -> bool {
    cancel.map_or(false, CancellationToken::is_cancelled)
}

impl GenerationClient {
    /// One network exchange raced against `timeout` and `cancel`.
    ///
    /// Whichever finishes first wins. The losing branches are dropped, which
    /// disarms the timer and stops the decode loop, so the chunk handler can
    /// never run after this returns.
    pub(crate) async fn execute_once(
        &self,
        body: &serde_json::Value,
        stream: bool,
        state: &Mutex<CallState<'_>>,
        cancel: Option<&CancellationToken>,
        timeout: Duration,
        request_id: &str,
    ) -> Result<()> {
        if is_cancelled(cancel) {
            return Err(Error::Cancelled);
        }
        lock_state(state).reset_undelivered();

        let start = Instant::now();
        let timed_out = || Error::Timeout {
            elapsed_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        };
        let exchange = self.exchange(body, stream, state, cancel, request_id);
        let outcome = match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(Error::Cancelled),
                r = exchange => r,
                _ = tokio::time::sleep(timeout) => Err(timed_out()),
            },
            None => tokio::select! {
                biased;
                r = exchange => r,
                _ = tokio::time::sleep(timeout) => Err(timed_out()),
            },
        };

        if let Err(e) = &outcome {
            debug!(
                request_id,
                error_class = e.class().name(),
                duration_ms = start.elapsed().as_millis() as u64,
                "attempt ended with error"
            );
        }
        outcome
    }

    async fn exchange(
        &self,
        body: &serde_json::Value,
        stream: bool,
        state: &Mutex<CallState<'_>>,
        cancel: Option<&CancellationToken>,
        request_id: &str,
    ) -> Result<()> {
        let start = Instant::now();
        let mut resp = self.transport.post(body, stream, request_id).await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let err = remote_error(status.as_u16(), &text);
            info!(
                http_status = status.as_u16(),
                error_class = err.class().name(),
                error_code = err.class().code(),
                request_id,
                duration_ms = start.elapsed().as_millis() as u64,
                "generation request failed"
            );
            return Err(err);
        }

        if !stream {
            let text = resp
                .text()
                .await
                .map_err(|e| Error::Transport(TransportError::Http(e)))?;
            let (content, usage) = parse_document(&text)?;
            let mut st = lock_state(state);
            st.content = content;
            st.usage = usage;
            return Ok(());
        }

        debug!(
            http_status = status.as_u16(),
            request_id,
            "generation request started streaming"
        );

        let mut codec = SseLineCodec::new();
        let mut buf = BytesMut::new();
        let mut frames: u64 = 0;
        loop {
            let chunk = resp
                .chunk()
                .await
                .map_err(|e| Error::Transport(TransportError::Http(e)))?;
            let eof = chunk.is_none();
            if let Some(bytes) = chunk {
                buf.extend_from_slice(&bytes);
            }

            loop {
                let next = if eof {
                    codec.decode_eof(&mut buf)?
                } else {
                    codec.decode(&mut buf)?
                };
                let Some(frame) = next else {
                    break;
                };
                if is_cancelled(cancel) {
                    return Err(Error::Cancelled);
                }
                frames += 1;
                match frame {
                    Frame::Delta { text, usage } => lock_state(state).push_delta(&text, usage)?,
                    Frame::Done => {
                        debug!(frames, request_id, "stream terminated by sentinel");
                        return Ok(());
                    }
                    Frame::Malformed { raw, reason } => {
                        let excerpt: String = raw.chars().take(200).collect();
                        warn!(request_id, reason = reason.as_str(), raw = excerpt.as_str(), "skipping malformed frame");
                    }
                }
            }

            if eof {
                debug!(frames, request_id, "stream closed without sentinel");
                return Ok(());
            }
        }
    }
}
