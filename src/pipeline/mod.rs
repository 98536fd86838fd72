//! 流水线模块：逐行解码流式响应，并提供可组合的重试算子。
//!
//! # Pipeline Layer
//!
//! Two building blocks sit between the transport and the client:
//!
//! ```text
//! Raw Bytes → SseLineCodec → Frame (Delta | Done | Malformed) → client accumulator
//!                                                    ▲
//!          RetryPolicy (local, linear) ∘ RetryPolicy (outer, exponential)
//! ```
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`decode`] | Line codec, frame parsing, non-streaming document parsing |
//! | [`retry`] | Backoff policies, retry classification |

pub mod decode;
pub mod retry;

pub use decode::{parse_document, parse_line, SseLineCodec, DATA_PREFIX, DONE_SENTINEL};
pub use retry::{classify, Backoff, RetryAttempt, RetryDecision, RetryPolicy};
