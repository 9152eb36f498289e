//! Multi-source day fetch and merge.
//!
//! A day is assembled from two sources fetched concurrently: the static feed
//! (uncategorized records) and the structured store (records grouped by
//! category id). Either source may fail without blocking the other.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use matchday_core::{
    day_label, finished_key, DayRecordSet, MatchRecord, SourceError, StaticFeed, StructuredStore,
};
use matchday_storage::{CachedSet, ExpirationPolicy, StoreKeys, TieredCache, VersionGate};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::constants::{STATIC_FEED_SOURCE, STRUCTURED_STORE_SOURCE};

/// Result of fetching one day.
#[derive(Debug, Clone)]
pub struct DayFetch {
    pub set: DayRecordSet,
    /// A source failed; `set` may be missing records that exist upstream.
    pub degraded: bool,
}

/// One category's entry in a stored day payload.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CategoryPayload {
    List(Vec<MatchRecord>),
    Wrapped { list: Vec<MatchRecord> },
}

impl CategoryPayload {
    fn into_records(self) -> Vec<MatchRecord> {
        match self {
            Self::List(records) | Self::Wrapped { list: records } => records,
        }
    }
}

/// Flatten a stored day payload in ascending category order, stamping each
/// record with its category id.
pub fn flatten_categorized(raw: &str) -> Result<Vec<MatchRecord>, serde_json::Error> {
    let payload: BTreeMap<String, CategoryPayload> = serde_json::from_str(raw)?;
    Ok(payload
        .into_iter()
        .flat_map(|(category, entry)| {
            entry
                .into_records()
                .into_iter()
                .map(move |record| record.with_category(&category))
        })
        .collect())
}

/// Merge two record lists.
///
/// `primary` wins on id collisions; records without an id are always kept.
/// The result is sorted by descending start time, stable for ties.
pub fn merge_records(primary: Vec<MatchRecord>, secondary: Vec<MatchRecord>) -> Vec<MatchRecord> {
    let mut seen = HashSet::new();
    let mut merged: Vec<MatchRecord> = primary
        .into_iter()
        .chain(secondary)
        .filter(|record| match record.match_id() {
            Some(id) => seen.insert(id),
            None => true,
        })
        .collect();
    merged.sort_by_key(|record| std::cmp::Reverse(record.start_time()));
    merged
}

/// Fetches and merges a day's records from the static feed and the store.
pub struct DayFetcher {
    feed: Arc<dyn StaticFeed>,
    store: Arc<dyn StructuredStore>,
    keys: StoreKeys,
    timeout: Duration,
}

impl DayFetcher {
    pub fn new(
        feed: Arc<dyn StaticFeed>,
        store: Arc<dyn StructuredStore>,
        keys: StoreKeys,
        timeout: Duration,
    ) -> Self {
        Self {
            feed,
            store,
            keys,
            timeout,
        }
    }

    pub async fn fetch_day(&self, date: NaiveDate) -> DayFetch {
        let (from_feed, from_store) = tokio::join!(self.fetch_static(date), self.fetch_structured(date));

        let mut degraded = false;
        let primary = from_feed.unwrap_or_else(|err| {
            warn!(date = %date, error = %err, source = STATIC_FEED_SOURCE, "source fetch failed");
            degraded = true;
            Vec::new()
        });
        let secondary = from_store.unwrap_or_else(|err| {
            warn!(date = %date, error = %err, source = STRUCTURED_STORE_SOURCE, "source fetch failed");
            degraded = true;
            Vec::new()
        });

        let (static_count, store_count) = (primary.len(), secondary.len());
        let items = merge_records(primary, secondary);
        debug!(
            date = %date,
            static_count,
            store_count,
            merged = items.len(),
            degraded,
            "day fetched"
        );

        DayFetch {
            set: DayRecordSet::new(date, day_label(date), items),
            degraded,
        }
    }

    async fn fetch_static(&self, date: NaiveDate) -> Result<Vec<MatchRecord>, SourceError> {
        match tokio::time::timeout(self.timeout, self.feed.fetch_day(date)).await {
            Ok(day) => Ok(day?.list),
            Err(_) => Err(SourceError::Timeout {
                source_name: STATIC_FEED_SOURCE.to_string(),
                timeout: self.timeout,
            }),
        }
    }

    async fn fetch_structured(&self, date: NaiveDate) -> Result<Vec<MatchRecord>, SourceError> {
        let key = self.keys.data(&finished_key(date));
        let raw = match tokio::time::timeout(self.timeout, self.store.get(&key)).await {
            Ok(raw) => raw?,
            Err(_) => {
                return Err(SourceError::Timeout {
                    source_name: STRUCTURED_STORE_SOURCE.to_string(),
                    timeout: self.timeout,
                })
            }
        };

        let Some(raw) = raw else {
            return Ok(Vec::new());
        };
        match flatten_categorized(&raw) {
            Ok(records) => Ok(records),
            Err(err) => {
                warn!(key = %key, error = %err, "malformed day payload ignored");
                Ok(Vec::new())
            }
        }
    }
}

/// Write a fetched day into the cache.
///
/// A degraded fetch never replaces a live entry, and the day's remembered
/// marker is dropped so the next cycle fetches it again. Returns whether the
/// cache was written.
pub fn apply_day(
    cache: &TieredCache<CachedSet>,
    gate: &VersionGate,
    fetch: DayFetch,
    policy: ExpirationPolicy,
) -> bool {
    let key = finished_key(fetch.set.date);
    if fetch.degraded {
        gate.forget(&key);
        if cache.contains(&key) {
            debug!(key = %key, "degraded fetch, keeping cached day");
            return false;
        }
    }
    cache.set(key, CachedSet::Day(fetch.set), policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use matchday_test_utils::fixtures::{league_record, match_record, ymd};
    use matchday_test_utils::generators::{arb_categorized, arb_records};
    use matchday_test_utils::{CountingStaticFeed, CountingStore};
    use proptest::prelude::*;

    fn fetcher(feed: Arc<CountingStaticFeed>, store: Arc<CountingStore>) -> DayFetcher {
        DayFetcher::new(feed, store, StoreKeys::default(), Duration::from_secs(5))
    }

    fn ids(records: &[MatchRecord]) -> Vec<String> {
        records.iter().filter_map(MatchRecord::match_id).collect()
    }

    #[test]
    fn test_merge_static_wins_and_sorts_descending() {
        let merged = merge_records(
            vec![match_record("1", 100, "足球"), match_record("2", 300, "篮球")],
            vec![league_record("1", 999, "3729"), league_record("3", 200, "3729")],
        );
        assert_eq!(ids(&merged), vec!["2", "3", "1"]);
        assert!(merged[2].category().is_none());
    }

    #[test]
    fn test_merge_keeps_records_without_id() {
        let anonymous = matchday_test_utils::fixtures::record_from(serde_json::json!({"start_time": "50"}));
        let merged = merge_records(vec![anonymous.clone(), anonymous], vec![]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_flatten_accepts_both_shapes_and_stamps_category() {
        let raw = r#"{
            "501": {"list": [{"saishi_id": "b", "start_time": "1"}], "name": "LPL"},
            "11": [{"saishi_id": "a", "start_time": "2"}]
        }"#;
        let records = flatten_categorized(raw).unwrap();
        assert_eq!(ids(&records), vec!["a", "b"]);
        assert_eq!(records[0].category().as_deref(), Some("11"));
        assert_eq!(records[1].category().as_deref(), Some("501"));
    }

    #[test]
    fn test_flatten_rejects_garbage() {
        assert!(flatten_categorized("[1,2,3]").is_err());
        assert!(flatten_categorized("not json").is_err());
    }

    #[tokio::test]
    async fn test_fetch_day_merges_both_sources() {
        let feed = Arc::new(CountingStaticFeed::new());
        let store = Arc::new(CountingStore::new());
        let date = ymd(2025, 6, 20);
        feed.publish(date, vec![match_record("1", 100, "足球")]);
        store
            .publish_day(date, &[("3729", vec![league_record("9", 500, "3729")])])
            .await;

        let fetch = fetcher(feed.clone(), store).fetch_day(date).await;
        assert!(!fetch.degraded);
        assert_eq!(ids(&fetch.set.items), vec!["9", "1"]);
        assert_eq!(fetch.set.label, "6月20日 星期五");
        assert_eq!(feed.calls_for(date), 1);
    }

    #[tokio::test]
    async fn test_fetch_day_isolates_source_failures() {
        let feed = Arc::new(CountingStaticFeed::new());
        let store = Arc::new(CountingStore::new());
        let date = ymd(2025, 6, 20);
        feed.fail_on(date);
        store
            .publish_day(date, &[("3729", vec![league_record("9", 500, "3729")])])
            .await;

        let fetch = fetcher(feed, store).fetch_day(date).await;
        assert!(fetch.degraded);
        assert_eq!(ids(&fetch.set.items), vec!["9"]);
    }

    #[tokio::test]
    async fn test_malformed_store_payload_is_absent_not_degraded() {
        let feed = Arc::new(CountingStaticFeed::new());
        let store = Arc::new(CountingStore::new());
        let date = ymd(2025, 6, 20);
        feed.publish(date, vec![match_record("1", 100, "足球")]);
        store.put("pgame:finished:2025-06-20", "{broken").await;

        let fetch = fetcher(feed, store).fetch_day(date).await;
        assert!(!fetch.degraded);
        assert_eq!(fetch.set.len(), 1);
    }

    #[tokio::test]
    async fn test_degraded_fetch_keeps_cached_day() {
        let store = Arc::new(CountingStore::new());
        let cache = TieredCache::new();
        let gate = VersionGate::new(store, StoreKeys::default());
        let date = ymd(2025, 6, 20);

        let good = DayFetch {
            set: DayRecordSet::new(date, day_label(date), vec![match_record("1", 1, "足球")]),
            degraded: false,
        };
        assert!(apply_day(&cache, &gate, good, ExpirationPolicy::Never));

        assert!(gate.changed("finished:2025-06-20").await);
        let degraded = DayFetch {
            set: DayRecordSet::new(date, day_label(date), vec![]),
            degraded: true,
        };
        assert!(!apply_day(&cache, &gate, degraded, ExpirationPolicy::Never));
        assert!(gate.remembered("finished:2025-06-20").is_none());

        let cached = cache.get("finished:2025-06-20").unwrap();
        assert_eq!(cached.as_day().map(DayRecordSet::len), Some(1));
    }

    proptest! {
        #[test]
        fn prop_merged_ids_unique(
            primary in arb_records(20),
            categorized in arb_categorized(10),
        ) {
            let secondary: Vec<MatchRecord> = categorized
                .into_iter()
                .flat_map(|(category, records)| {
                    records.into_iter().map(move |r| r.with_category(&category))
                })
                .collect();
            let merged = merge_records(primary, secondary);
            let all = ids(&merged);
            let unique: HashSet<_> = all.iter().collect();
            prop_assert_eq!(unique.len(), all.len());
        }

        #[test]
        fn prop_merged_sorted_descending(
            primary in arb_records(20),
            secondary in arb_records(20),
        ) {
            let merged = merge_records(primary, secondary);
            for pair in merged.windows(2) {
                prop_assert!(pair[0].start_time() >= pair[1].start_time());
            }
        }

        #[test]
        fn prop_primary_wins_collisions(primary in arb_records(20), secondary in arb_records(20)) {
            let merged = merge_records(primary.clone(), secondary);
            for record in &primary {
                if let Some(id) = record.match_id() {
                    let first_in_primary = primary.iter().find(|r| r.match_id().as_deref() == Some(&id));
                    let kept = merged.iter().find(|r| r.match_id().as_deref() == Some(&id));
                    prop_assert_eq!(kept, first_in_primary);
                }
            }
        }
    }
}
