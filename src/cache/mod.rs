//! Caching of trained models
//!
//! - [`LruTtlCache`]: generic thread-safe LRU cache with optional TTL
//! - [`ModelCache`]: fitted models keyed by (dataset fingerprint, model kind,
//!   hyperparameter digest) with explicit per-dataset invalidation

mod lru_ttl;
mod model_cache;

pub use lru_ttl::{CacheCounters, LruTtlCache};
pub use model_cache::{CacheConfig, CacheKey, CacheStats, DatasetFingerprint, ModelCache};
