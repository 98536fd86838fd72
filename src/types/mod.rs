//! 类型系统模块：生成请求、消息、结果与流式帧。
//!
//! # Types Module
//!
//! Strongly typed representations of everything that crosses the client
//! boundary: inbound requests, outbound results, and the frames decoded off
//! the wire in between.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`GenerationRequest`] | Model, non-empty messages, token ceiling, temperature, stream flag |
//! | [`Message`] | Chat turn with plain or mixed text/image content |
//! | [`GenerationResult`] | Accumulated text, optional usage, success/failed status |
//! | [`Frame`] | `Delta` / `Done` / `Malformed` decoded from one line |
//!
//! ## Example
//!
//! ```rust
//! use storyboard_runtime::types::{ContentPart, GenerationRequest};
//!
//! let req = GenerationRequest::with_images(
//!     "qwen-vl-max",
//!     "Describe the lighting in this frame",
//!     vec![ContentPart::image_jpeg(&[0xFF, 0xD8, 0xFF])],
//! )
//! .max_tokens(4000)
//! .stream(true);
//! assert!(req.validate().is_ok());
//! assert!(req.has_images());
//! ```

pub mod events;
pub mod message;
pub mod request;
pub mod result;

pub use events::Frame;
pub use message::{ContentPart, ImageUrl, Message, MessageContent, MessageRole};
pub use request::GenerationRequest;
pub use result::{CallStatus, GenerationResult, Usage};
