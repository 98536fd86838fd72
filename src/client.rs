//! Client for the generation service.
//!
//! Keep the public surface small: build a [`GenerationClient`], then call
//! [`GenerationClient::send`] for one exchange or [`GenerationClient::generate`]
//! for the retried, usage-recorded path. Implementation details are split
//! into submodules under `src/client/`.

pub mod builder;
pub mod core;
mod error_classification;
mod execution;
mod policy;
pub mod types;

pub use builder::GenerationClientBuilder;
pub use core::GenerationClient;
pub use types::ChunkHandler;
