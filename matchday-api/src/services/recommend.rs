//! Recommendation set: promoted matches grouped by category, then by day.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use matchday_core::{
    day_label, parse_date, CategoryFilter, DayGroup, MatchRecord, RecommendationSet, SourceError,
    StructuredStore, RECOMMEND_KEY,
};
use matchday_storage::{CachedSet, ExpirationPolicy, StoreKeys, TieredCache, VersionGate};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::RefreshOutcome;
use crate::constants::STRUCTURED_STORE_SOURCE;

/// Day group as published in the store.
#[derive(Debug, Deserialize)]
struct StoredGroup {
    date: String,
    #[serde(default)]
    date_str: String,
    #[serde(default)]
    list: Vec<MatchRecord>,
}

fn dedup_by_id(records: Vec<MatchRecord>) -> Vec<MatchRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| match record.match_id() {
            Some(id) => seen.insert(id),
            None => true,
        })
        .collect()
}

/// Decode the stored payload: category id -> day groups.
///
/// Groups with an unreadable date are dropped. Each category's groups come
/// out in ascending date order with their records deduplicated.
pub fn parse_recommendations(raw: &str) -> Result<RecommendationSet, serde_json::Error> {
    let payload: BTreeMap<String, Vec<StoredGroup>> = serde_json::from_str(raw)?;
    let by_category = payload
        .into_iter()
        .map(|(category, groups)| {
            let mut groups: Vec<DayGroup> = groups
                .into_iter()
                .filter_map(|group| {
                    let Some(date) = parse_date(&group.date) else {
                        warn!(category = %category, date = %group.date, "recommendation group without date dropped");
                        return None;
                    };
                    let label = if group.date_str.is_empty() {
                        day_label(date)
                    } else {
                        group.date_str
                    };
                    Some(DayGroup {
                        format_date: date,
                        date: label,
                        list: dedup_by_id(group.list),
                    })
                })
                .collect();
            groups.sort_by_key(|group| group.format_date);
            (category, groups)
        })
        .collect();
    Ok(RecommendationSet::new(by_category))
}

/// Combine the day groups of the selected categories.
///
/// Groups sharing a date are merged and deduplicated by match id. An empty
/// filter selects every category.
pub fn select_groups(set: &RecommendationSet, filter: &CategoryFilter) -> Vec<DayGroup> {
    let mut by_date: BTreeMap<NaiveDate, DayGroup> = BTreeMap::new();
    for (category, groups) in &set.by_category {
        if !filter.is_empty() && !filter.allows(category) {
            continue;
        }
        for group in groups {
            by_date
                .entry(group.format_date)
                .and_modify(|existing| existing.list.extend(group.list.iter().cloned()))
                .or_insert_with(|| group.clone());
        }
    }
    by_date
        .into_values()
        .map(|mut group| {
            group.list = dedup_by_id(group.list);
            group
        })
        .collect()
}

/// Refresh and read path of the global recommendation set.
pub struct RecommendationService {
    store: Arc<dyn StructuredStore>,
    keys: StoreKeys,
    cache: Arc<TieredCache<CachedSet>>,
    gate: Arc<VersionGate>,
    timeout: Duration,
}

impl RecommendationService {
    pub fn new(
        store: Arc<dyn StructuredStore>,
        keys: StoreKeys,
        cache: Arc<TieredCache<CachedSet>>,
        gate: Arc<VersionGate>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            keys,
            cache,
            gate,
            timeout,
        }
    }

    /// Read the payload from the store. A missing or malformed payload is an
    /// empty set; only store failures are errors.
    pub async fn fetch(&self) -> Result<RecommendationSet, SourceError> {
        let key = self.keys.data(RECOMMEND_KEY);
        let raw = tokio::time::timeout(self.timeout, self.store.get(&key))
            .await
            .map_err(|_| SourceError::Timeout {
                source_name: STRUCTURED_STORE_SOURCE.to_string(),
                timeout: self.timeout,
            })??;

        let Some(raw) = raw else {
            return Ok(RecommendationSet::new(BTreeMap::new()));
        };
        match parse_recommendations(&raw) {
            Ok(set) => Ok(set),
            Err(err) => {
                warn!(key = %key, error = %err, "malformed recommendation payload ignored");
                Ok(RecommendationSet::new(BTreeMap::new()))
            }
        }
    }

    /// Gate, fetch, then write with no expiry.
    pub async fn refresh(&self) -> RefreshOutcome {
        if !self.gate.changed(RECOMMEND_KEY).await {
            return RefreshOutcome::Skipped;
        }
        self.force_refresh().await
    }

    /// Fetch and write, bypassing the version gate.
    pub async fn force_refresh(&self) -> RefreshOutcome {
        match self.fetch().await {
            Ok(set) => {
                let groups = set.group_count();
                if self.cache.set(RECOMMEND_KEY, set.into(), ExpirationPolicy::Never) {
                    info!(groups, "recommendations updated");
                    RefreshOutcome::Written
                } else {
                    RefreshOutcome::Unchanged
                }
            }
            Err(err) => {
                warn!(error = %err, "recommendation refresh failed, keeping previous set");
                self.gate.forget(RECOMMEND_KEY);
                RefreshOutcome::Failed
            }
        }
    }

    /// Day groups for the selected categories, ascending by date.
    pub async fn list(&self, filter: &CategoryFilter) -> Vec<DayGroup> {
        if let Some(cached) = self.cache.get(RECOMMEND_KEY) {
            if let Some(set) = cached.as_recommendations() {
                return select_groups(set, filter);
            }
        }

        debug!("recommendation cache miss, fetching");
        match self.fetch().await {
            Ok(set) => {
                let groups = select_groups(&set, filter);
                self.cache.set(RECOMMEND_KEY, set.into(), ExpirationPolicy::Never);
                groups
            }
            Err(err) => {
                warn!(error = %err, "recommendation fetch failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matchday_test_utils::fixtures::{league_record, ymd};
    use matchday_test_utils::CountingStore;

    fn service(store: Arc<CountingStore>) -> RecommendationService {
        let gate = Arc::new(VersionGate::new(store.clone(), StoreKeys::default()));
        RecommendationService::new(
            store,
            StoreKeys::default(),
            Arc::new(TieredCache::new()),
            gate,
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_parse_orders_and_dedups_groups() {
        let raw = r#"{"3729": [
            {"date": "2025-06-22", "date_str": "6月22日 星期日", "list": [{"saishi_id": "2"}]},
            {"date": "2025-06-21", "list": [{"saishi_id": "1"}, {"saishi_id": "1"}]},
            {"date": "someday", "list": []}
        ]}"#;
        let set = parse_recommendations(raw).unwrap();
        let groups = &set.by_category["3729"];
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].format_date, ymd(2025, 6, 21));
        assert_eq!(groups[0].date, "6月21日 星期六");
        assert_eq!(groups[0].list.len(), 1);
        assert_eq!(groups[1].date, "6月22日 星期日");
    }

    #[test]
    fn test_select_groups_combines_same_day() {
        let mut by_category = BTreeMap::new();
        by_category.insert(
            "11".to_string(),
            vec![DayGroup {
                format_date: ymd(2025, 6, 21),
                date: day_label(ymd(2025, 6, 21)),
                list: vec![league_record("1", 1, "11"), league_record("2", 2, "11")],
            }],
        );
        by_category.insert(
            "3729".to_string(),
            vec![DayGroup {
                format_date: ymd(2025, 6, 21),
                date: day_label(ymd(2025, 6, 21)),
                list: vec![league_record("2", 2, "3729"), league_record("3", 3, "3729")],
            }],
        );
        let set = RecommendationSet::new(by_category);

        let all = select_groups(&set, &CategoryFilter::default());
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].list.len(), 3);

        let only = select_groups(&set, &CategoryFilter::from_ids("3729"));
        assert_eq!(only[0].list.len(), 2);

        assert!(select_groups(&set, &CategoryFilter::from_ids("404")).is_empty());
    }

    #[tokio::test]
    async fn test_refresh_is_gated_by_marker() {
        let store = Arc::new(CountingStore::new());
        let mut groups = BTreeMap::new();
        groups.insert("3729", vec![(ymd(2025, 6, 21), vec![league_record("1", 1, "3729")])]);
        store.publish_recommendations(&groups).await;
        store.set_marker(RECOMMEND_KEY, "1").await;
        let service = service(store.clone());

        assert_eq!(service.refresh().await, RefreshOutcome::Written);
        assert_eq!(service.refresh().await, RefreshOutcome::Skipped);

        store.set_marker(RECOMMEND_KEY, "2").await;
        assert_eq!(service.refresh().await, RefreshOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_set() {
        let store = Arc::new(CountingStore::new());
        let mut groups = BTreeMap::new();
        groups.insert("3729", vec![(ymd(2025, 6, 21), vec![league_record("1", 1, "3729")])]);
        store.publish_recommendations(&groups).await;
        let service = service(store.clone());
        assert_eq!(service.refresh().await, RefreshOutcome::Written);

        store.set_marker(RECOMMEND_KEY, "2").await;
        store.set_failing(true);
        assert_eq!(service.refresh().await, RefreshOutcome::Failed);
        store.set_failing(false);

        let listed = service.list(&CategoryFilter::from_ids("3729")).await;
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_list_pulls_through_on_miss() {
        let store = Arc::new(CountingStore::new());
        let mut groups = BTreeMap::new();
        groups.insert("3729", vec![(ymd(2025, 6, 21), vec![league_record("1", 1, "3729")])]);
        store.publish_recommendations(&groups).await;
        let service = service(store.clone());

        assert_eq!(service.list(&CategoryFilter::default()).await.len(), 1);
        assert_eq!(service.list(&CategoryFilter::default()).await.len(), 1);
        assert_eq!(store.gets_for("pgame:recommend"), 1);
    }
}
