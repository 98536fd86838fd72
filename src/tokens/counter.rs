//! Token counter implementations.

use crate::types::message::{ContentPart, MessageContent};
use crate::types::Message;

/// Flat cost charged for one image part.
const IMAGE_TOKENS: usize = 85;

pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;

    fn count_messages(&self, messages: &[Message]) -> usize {
        let mut total = 0;
        for message in messages {
            match &message.content {
                MessageContent::Text(text) => {
                    total += self.count(text);
                }
                MessageContent::Parts(parts) => {
                    for part in parts {
                        match part {
                            ContentPart::Text { text } => {
                                total += self.count(text);
                            }
                            ContentPart::ImageUrl { .. } => {
                                total += IMAGE_TOKENS;
                            }
                        }
                    }
                }
            }
        }
        total + messages.len() * 3
    }
}

/// Byte-length approximation (4 bytes ≈ 1 token).
#[derive(Debug, Clone)]
pub struct CharacterEstimator {
    chars_per_token: f64,
}
impl CharacterEstimator {
    pub fn new() -> Self {
        Self::with_ratio(4.0)
    }
    pub fn with_ratio(r: f64) -> Self {
        Self { chars_per_token: r }
    }
}
impl Default for CharacterEstimator {
    fn default() -> Self {
        Self::new()
    }
}
impl TokenCounter for CharacterEstimator {
    fn count(&self, text: &str) -> usize {
        (text.len() as f64 / self.chars_per_token).ceil() as usize
    }
}

/// Counts every CJK ideograph, kana or hangul syllable as one token and the
/// rest of the text at the Latin ratio. Byte-length estimates overcount
/// Chinese prose roughly threefold.
#[derive(Debug, Clone)]
pub struct CjkAwareEstimator {
    latin_chars_per_token: f64,
}
impl CjkAwareEstimator {
    pub fn new() -> Self {
        Self {
            latin_chars_per_token: 4.0,
        }
    }
}
impl Default for CjkAwareEstimator {
    fn default() -> Self {
        Self::new()
    }
}
impl TokenCounter for CjkAwareEstimator {
    fn count(&self, text: &str) -> usize {
        let (cjk, other) = text.chars().fold((0usize, 0usize), |(cjk, other), c| {
            if is_cjk(c) {
                (cjk + 1, other)
            } else {
                (cjk, other + 1)
            }
        });
        cjk + (other as f64 / self.latin_chars_per_token).ceil() as usize
    }
}

fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x3040..=0x30FF      // kana
        | 0x3400..=0x4DBF    // CJK extension A
        | 0x4E00..=0x9FFF    // CJK unified ideographs
        | 0xAC00..=0xD7AF    // hangul syllables
        | 0xF900..=0xFAFF    // compatibility ideographs
        | 0xFF00..=0xFFEF    // full-width forms
        | 0x3000..=0x303F    // CJK punctuation
    )
}
