//! Cacheable value contract and cache statistics.

use matchday_core::{DayRecordSet, RecommendationSet};
use serde::Serialize;

/// Values the tiered cache can hold.
///
/// # Implementation Requirements
///
/// - `same_content()` must ignore bookkeeping fields such as `updated_at`,
///   otherwise write suppression never triggers
/// - `list_count()` is informational and only shows up in [`CacheStats`]
pub trait Cacheable: Serialize + Send + Sync + 'static {
    /// Structural equality of the payload.
    fn same_content(&self, other: &Self) -> bool;

    /// Number of listed items, for statistics.
    fn list_count(&self) -> usize;
}

impl Cacheable for DayRecordSet {
    fn same_content(&self, other: &Self) -> bool {
        DayRecordSet::same_content(self, other)
    }

    fn list_count(&self) -> usize {
        self.len()
    }
}

impl Cacheable for RecommendationSet {
    fn same_content(&self, other: &Self) -> bool {
        RecommendationSet::same_content(self, other)
    }

    fn list_count(&self) -> usize {
        self.group_count()
    }
}

/// Everything the service keeps in its single cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CachedSet {
    Day(DayRecordSet),
    Recommendations(RecommendationSet),
}

impl CachedSet {
    pub fn as_day(&self) -> Option<&DayRecordSet> {
        match self {
            Self::Day(set) => Some(set),
            Self::Recommendations(_) => None,
        }
    }

    pub fn as_recommendations(&self) -> Option<&RecommendationSet> {
        match self {
            Self::Recommendations(set) => Some(set),
            Self::Day(_) => None,
        }
    }
}

impl Cacheable for CachedSet {
    fn same_content(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Day(a), Self::Day(b)) => a.same_content(b),
            (Self::Recommendations(a), Self::Recommendations(b)) => a.same_content(b),
            _ => false,
        }
    }

    fn list_count(&self) -> usize {
        match self {
            Self::Day(set) => Cacheable::list_count(set),
            Self::Recommendations(set) => Cacheable::list_count(set),
        }
    }
}

impl From<DayRecordSet> for CachedSet {
    fn from(set: DayRecordSet) -> Self {
        Self::Day(set)
    }
}

impl From<RecommendationSet> for CachedSet {
    fn from(set: RecommendationSet) -> Self {
        Self::Recommendations(set)
    }
}

/// Per-key detail reported by [`CacheStats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheKeyDetail {
    pub key: String,
    pub size_bytes: u64,
    pub size_mb: f64,
    pub list_count: usize,
    /// Seconds left before expiry; `None` for entries that never expire.
    pub expires_in_secs: Option<u64>,
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of live entries.
    pub item_count: usize,
    pub hits: u64,
    pub misses: u64,
    /// Writes that replaced or created an entry.
    pub writes: u64,
    /// Writes skipped because the content was unchanged.
    pub suppressed_writes: u64,
    /// Estimated serialized size of all entries.
    pub cache_size_mb: f64,
    pub keys: Vec<CacheKeyDetail>,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use std::collections::BTreeMap;

    fn day(items: usize) -> DayRecordSet {
        let records = (0..items)
            .map(|i| {
                serde_json::from_value(serde_json::json!({"saishi_id": i.to_string()})).unwrap()
            })
            .collect();
        DayRecordSet::new(NaiveDate::from_ymd_opt(2025, 6, 20).unwrap(), "6月20日 星期五", records)
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_cached_set_same_content_ignores_updated_at() {
        let a = day(2);
        let mut b = a.clone();
        b.updated_at = a.updated_at + Duration::minutes(5);
        assert!(CachedSet::from(a).same_content(&CachedSet::from(b)));
    }

    #[test]
    fn test_cached_set_variants_never_equal() {
        let rec = RecommendationSet::new(BTreeMap::new());
        assert!(!CachedSet::from(day(0)).same_content(&CachedSet::from(rec)));
    }

    #[test]
    fn test_list_count() {
        assert_eq!(CachedSet::from(day(3)).list_count(), 3);
    }
}
