//! Token 估算模块：服务未返回用量时，按字符估算输入与输出的 Token 数。
//!
//! # Token Estimation Module
//!
//! The generation service usually reports usage on the final frame. When it
//! does not, the client falls back to one of these estimators so every usage
//! record still carries token counts.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`TokenCounter`] | Trait for token estimation |
//! | [`CharacterEstimator`] | 4 bytes ≈ 1 token |
//! | [`CjkAwareEstimator`] | One token per CJK character; default for the client |
//!
//! ```rust
//! use storyboard_runtime::tokens::{CjkAwareEstimator, TokenCounter};
//!
//! let counter = CjkAwareEstimator::new();
//! assert_eq!(counter.count("镜头一"), 3);
//! ```

mod counter;

pub use counter::{CharacterEstimator, CjkAwareEstimator, TokenCounter};
