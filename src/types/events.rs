//! Decoded transport frames.

use super::result::Usage;

/// One decoded unit of an incrementally delivered reply.
///
/// Wire payloads are parsed into this enum before any client logic inspects
/// them, so a brittle payload can only ever surface as `Malformed`.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Incremental text. The final frame may also carry usage counts.
    Delta { text: String, usage: Option<Usage> },
    /// Termination sentinel.
    Done,
    /// A data line whose payload could not be parsed. Skipped by the client.
    Malformed { raw: String, reason: String },
}

impl Frame {
    pub fn delta(text: impl Into<String>) -> Self {
        Frame::Delta {
            text: text.into(),
            usage: None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Frame::Done)
    }
}
