//! # storyboard-runtime
//!
//! 分镜助手的生成运行时：可重试、可取消的流式调用，以及有界、可过期的结果缓存。
//!
//! Generation runtime for the storyboard assistant: retrying, cancellable,
//! incrementally decoded calls to a hosted text/image generation service,
//! backed by a bounded expiring result cache.
//!
//! ## Overview
//!
//! Prompt construction, history and rendering live in the application. This
//! crate owns the hard part in between: getting a reply back reliably.
//!
//! - **Streaming-First**: newline-delimited `data:` frames are decoded only
//!   once a line is complete and handed to the caller in arrival order
//! - **Racing**: every attempt races its timeout against caller cancellation;
//!   the loser has no further effect
//! - **Nested Retry**: a linear local retry around each transport call, wrapped
//!   by an exponential outer retry, both driven by a closed error taxonomy
//! - **Caching**: four isolated LRU + TTL stores for repeated generations
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use storyboard_runtime::{GenerationClientBuilder, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = GenerationClientBuilder::from_env().build()?;
//!     let request = client
//!         .request_for("Write a three-shot storyboard for a rainy street", vec![])
//!         .stream(true);
//!
//!     let mut print = |delta: &str, _full: &str| -> Result<()> {
//!         print!("{delta}");
//!         Ok(())
//!     };
//!     let result = client.generate("script", &request, Some(&mut print), None).await?;
//!     println!("\n{} chars", result.content.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | `send`, nested retry, cache-aware entry points, builder |
//! | [`pipeline`] | Line decoding and the retry operator |
//! | [`cache`] | LRU + TTL response cache |
//! | [`types`] | Requests, messages, results, frames |
//! | [`transport`] | reqwest-based HTTP transport |
//! | [`usage`] | Usage records and recorders |
//! | [`tokens`] | Token estimation fallback |
//! | [`config`] | YAML + environment configuration |

pub mod cache;
pub mod client;
pub mod config;
pub mod error_code;
pub mod pipeline;
pub mod tokens;
pub mod transport;
pub mod types;
pub mod usage;

// Re-export main types for convenience
pub use cache::{CacheKind, ResponseCache};
pub use client::{ChunkHandler, GenerationClient, GenerationClientBuilder};
pub use config::ClientConfig;
pub use error_code::ErrorClass;
pub use pipeline::retry::RetryPolicy;
pub use types::{
    message::{Message, MessageRole},
    GenerationRequest, GenerationResult,
};
pub use usage::{UsageRecord, UsageRecorder};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
