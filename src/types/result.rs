//! Generation outcomes and token usage.

use serde::{Deserialize, Serialize};

/// Token counts reported by the service (or estimated when it reports none).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Success,
    Failed,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Success => "success",
            CallStatus::Failed => "failed",
        }
    }
}

/// Accumulated output of one logical call.
///
/// A failed result keeps whatever content arrived before the failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub content: String,
    pub usage: Option<Usage>,
    pub status: CallStatus,
}

impl GenerationResult {
    pub fn success(content: impl Into<String>, usage: Option<Usage>) -> Self {
        Self {
            content: content.into(),
            usage,
            status: CallStatus::Success,
        }
    }

    pub fn failed(partial: impl Into<String>, usage: Option<Usage>) -> Self {
        Self {
            content: partial.into(),
            usage,
            status: CallStatus::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == CallStatus::Success
    }
}
