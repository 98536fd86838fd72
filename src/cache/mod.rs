//! 响应缓存模块：带容量上限与过期时间的 LRU 缓存，避免重复调用生成服务。
//!
//! # Response Caching Module
//!
//! In-memory, process-lifetime memoization of generation results.
//!
//! ## Overview
//!
//! Four isolated stores, one per concern, share the same rules:
//!
//! | Kind | Capacity | TTL |
//! |------|----------|-----|
//! | [`CacheKind::Generation`] | 150 | 1 h |
//! | [`CacheKind::Analysis`] | 100 | 30 min |
//! | [`CacheKind::Visualization`] | 60 | 15 min |
//! | [`CacheKind::Prompt`] | 120 | 2 h |
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ResponseCache`] | The four stores, cleanup, stats, recommendations, preload |
//! | [`LruTtlCache`] | One bounded store: LRU eviction plus per-entry expiry |
//! | [`CacheKey`] | Namespace + sorted-key parameters, or namespace + text hash |
//! | [`Clock`] | Injectable time source; [`ManualClock`] for tests |
//!
//! ## Example
//!
//! ```rust
//! use storyboard_runtime::cache::{CacheConfig, CacheKind, ResponseCache};
//! use serde_json::json;
//!
//! let cache = ResponseCache::new(&CacheConfig::default());
//! let params = json!({"scene": 3, "style": "noir"});
//! cache.set(CacheKind::Generation, &params, json!("FADE IN:"));
//! assert_eq!(cache.get(CacheKind::Generation, &params), Some(json!("FADE IN:")));
//! assert_eq!(cache.stats(CacheKind::Generation).hits, 1);
//! ```
//!
//! Cache failures never surface: they read as misses.

mod backend;
mod clock;
mod key;
mod manager;

pub use backend::{CacheStats, LruTtlCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use key::{normalize_text, text_fingerprint, CacheKey};
pub use manager::{
    CacheConfig, CacheKind, CacheRecommendation, ResponseCache, StoreConfig, PRELOAD_CONCURRENCY,
};
