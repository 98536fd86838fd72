//! Line decoding (Bytes -> Frame)
//!
//! The streaming reply is a newline-delimited sequence of lines. Each line is
//! blank, a comment, the termination sentinel, or a `data:`-prefixed JSON
//! fragment. [`SseLineCodec`] only decodes a line once its newline has arrived;
//! a partial trailing line stays in the buffer until the next network chunk.

use bytes::BytesMut;
use serde::Deserialize;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::types::{Frame, Usage};
use crate::{Error, Result};

/// Event-data prefix. The single space after the colon is optional.
pub const DATA_PREFIX: &str = "data:";

/// Payload that terminates the stream.
pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Deserialize, Debug)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    /// Flat `{"delta": "..."}` shape used by the local proxy.
    delta: Option<String>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize, Debug)]
struct StreamChoice {
    delta: Option<StreamDelta>,
}

#[derive(Deserialize, Debug)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct WireUsage {
    #[serde(alias = "input_tokens")]
    prompt_tokens: Option<u64>,
    #[serde(alias = "output_tokens")]
    completion_tokens: Option<u64>,
}

impl WireUsage {
    fn into_usage(self) -> Option<Usage> {
        if self.prompt_tokens.is_none() && self.completion_tokens.is_none() {
            return None;
        }
        Some(Usage::new(
            self.prompt_tokens.unwrap_or(0),
            self.completion_tokens.unwrap_or(0),
        ))
    }
}

#[derive(Deserialize, Debug)]
struct CompletionBody {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize, Debug)]
struct CompletionChoice {
    message: Option<CompletionMessage>,
}

#[derive(Deserialize, Debug)]
struct CompletionMessage {
    content: Option<String>,
}

/// Splits buffered bytes into complete lines and parses each into a [`Frame`].
///
/// Lines that carry no frame (blank, comments, non-data fields) are consumed
/// silently, so `decode` returns `Ok(None)` only when no complete line is left.
#[derive(Debug, Default, Clone)]
pub struct SseLineCodec {
    /// Bytes before this offset are already known to hold no newline.
    next_index: usize,
}

impl SseLineCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for SseLineCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        while let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') {
            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;
            if let Some(frame) = parse_line(&String::from_utf8_lossy(&line)) {
                return Ok(Some(frame));
            }
        }
        self.next_index = src.len();
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.is_empty() {
            return Ok(None);
        }
        // Unterminated final line: the connection closed, so it is complete now.
        self.next_index = 0;
        let rest = src.split();
        Ok(parse_line(&String::from_utf8_lossy(&rest)))
    }
}

/// Parse one complete line. `None` means the line carries no frame.
pub fn parse_line(line: &str) -> Option<Frame> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(':') {
        return None;
    }
    if trimmed == DONE_SENTINEL {
        return Some(Frame::Done);
    }
    let payload = trimmed.strip_prefix(DATA_PREFIX)?.trim_start();
    if payload == DONE_SENTINEL {
        return Some(Frame::Done);
    }
    Some(parse_payload(payload))
}

/// Parse the JSON fragment after the data prefix.
pub fn parse_payload(payload: &str) -> Frame {
    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(chunk) => {
            let text = chunk
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.delta)
                .and_then(|d| d.content)
                .or(chunk.delta)
                .unwrap_or_default();
            let usage = chunk.usage.and_then(WireUsage::into_usage);
            trace!(len = text.len(), has_usage = usage.is_some(), "decoded delta");
            Frame::Delta { text, usage }
        }
        Err(e) => Frame::Malformed {
            raw: payload.to_string(),
            reason: e.to_string(),
        },
    }
}

/// Parse a complete non-streaming reply body.
///
/// Unlike a malformed frame, an unreadable document fails the call.
pub fn parse_document(body: &str) -> Result<(String, Option<Usage>)> {
    let parsed: CompletionBody = serde_json::from_str(body)
        .map_err(|e| Error::protocol(format!("reply is not a valid completion document: {}", e)))?;
    let first = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| Error::protocol("reply carried no choices"))?;
    let content = first.message.and_then(|m| m.content).unwrap_or_default();
    Ok((content, parsed.usage.and_then(WireUsage::into_usage)))
}
