//! Matchday Storage
//!
//! The engine's shared state: the tiered in-memory cache, the version gate
//! that decides when a domain needs a fetch, and the structured-store
//! backends (in-memory for development, Redis for production).

pub mod cache;
pub mod store;
pub mod version_gate;

pub use cache::{
    CacheEntry, CacheKeyDetail, CacheStats, Cacheable, CachedSet, ExpirationPolicy, TieredCache,
};
pub use store::{
    redact_url, InMemoryStructuredStore, RedisStructuredStore, StoreKeys, DEFAULT_NAMESPACE,
};
pub use version_gate::VersionGate;
