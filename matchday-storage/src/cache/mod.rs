//! Tiered in-memory cache.
//!
//! Entries live in a concurrent map keyed by domain key (`finished:<date>`,
//! `recommend`). Each entry carries an [`ExpirationPolicy`] chosen by the
//! caller from the age of the day it holds.
//!
//! # Write Suppression
//!
//! [`TieredCache::set`] compares the new value with the live one through
//! [`Cacheable::same_content`]. Equal content is a no-op, so refresh cycles
//! that re-fetch unchanged data neither churn memory nor bump `updated_at`.

pub mod policy;
pub mod tiered;
pub mod traits;

pub use policy::ExpirationPolicy;
pub use tiered::{CacheEntry, TieredCache};
pub use traits::{CacheKeyDetail, CacheStats, Cacheable, CachedSet};
