//! Matchday Test Utilities
//!
//! Shared test infrastructure for the matchday workspace:
//! - Counting fakes of every external source
//! - Proptest generators for match records
//! - Fixtures for common record shapes

pub use matchday_core::{
    day_label, finished_key, CategoryFilter, DayGroup, DayRecordSet, EngineConfig, FixedClock,
    InterestFilter, MatchRecord, OracleQuery, SearchOracle, SourceError, StaticDay, StaticFeed,
    StoreError, StructuredStore, RECOMMEND_KEY,
};
pub use matchday_storage::{InMemoryStructuredStore, StoreKeys};

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// COUNTING FAKES
// ============================================================================

/// Static feed serving canned days and counting every request.
///
/// Days that were never published answer with an empty list, like the real
/// feed answering an empty file. Days marked failing answer with an error.
#[derive(Debug, Default)]
pub struct CountingStaticFeed {
    days: Mutex<HashMap<NaiveDate, Vec<MatchRecord>>>,
    failing: Mutex<Vec<NaiveDate>>,
    requests: Mutex<Vec<NaiveDate>>,
}

impl CountingStaticFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, date: NaiveDate, records: Vec<MatchRecord>) {
        locked(&self.days).insert(date, records);
    }

    pub fn fail_on(&self, date: NaiveDate) {
        locked(&self.failing).push(date);
    }

    pub fn recover(&self, date: NaiveDate) {
        locked(&self.failing).retain(|d| *d != date);
    }

    /// Total number of `fetch_day` calls.
    pub fn calls(&self) -> usize {
        locked(&self.requests).len()
    }

    pub fn calls_for(&self, date: NaiveDate) -> usize {
        locked(&self.requests).iter().filter(|d| **d == date).count()
    }

    pub fn reset_calls(&self) {
        locked(&self.requests).clear();
    }
}

#[async_trait]
impl StaticFeed for CountingStaticFeed {
    async fn fetch_day(&self, date: NaiveDate) -> Result<StaticDay, SourceError> {
        locked(&self.requests).push(date);
        if locked(&self.failing).contains(&date) {
            return Err(SourceError::http("static-feed", "connection refused"));
        }
        let list = locked(&self.days).get(&date).cloned().unwrap_or_default();
        Ok(StaticDay {
            date: date.format("%Y-%m-%d").to_string(),
            date_str: day_label(date),
            list,
        })
    }
}

/// In-memory structured store that counts reads and writes per key and can be
/// switched into a failing mode.
#[derive(Debug, Default)]
pub struct CountingStore {
    inner: InMemoryStructuredStore,
    keys: StoreKeys,
    gets: Mutex<HashMap<String, usize>>,
    sets: AtomicUsize,
    deleted: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store_keys(&self) -> &StoreKeys {
        &self.keys
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn gets_for(&self, key: &str) -> usize {
        locked(&self.gets).get(key).copied().unwrap_or(0)
    }

    /// Reads of day payloads (`<ns>finished:<date>`), markers excluded.
    pub fn day_payload_reads(&self) -> usize {
        locked(&self.gets)
            .iter()
            .filter(|(key, _)| key.contains("finished:") && !key.ends_with(":code"))
            .map(|(_, count)| *count)
            .sum()
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn deleted_keys(&self) -> Vec<String> {
        locked(&self.deleted).clone()
    }

    /// Publish a day's categorized payload.
    pub async fn publish_day(&self, date: NaiveDate, categories: &[(&str, Vec<MatchRecord>)]) {
        let payload: serde_json::Map<String, Value> = categories
            .iter()
            .map(|(category, records)| (category.to_string(), json!(records)))
            .collect();
        self.put(&self.keys.data(&finished_key(date)), &Value::Object(payload).to_string())
            .await;
    }

    /// Publish the recommendation payload: category -> day groups.
    pub async fn publish_recommendations(
        &self,
        groups: &BTreeMap<&str, Vec<(NaiveDate, Vec<MatchRecord>)>>,
    ) {
        let payload: serde_json::Map<String, Value> = groups
            .iter()
            .map(|(category, days)| {
                let days: Vec<Value> = days
                    .iter()
                    .map(|(date, list)| {
                        json!({
                            "date": date.format("%Y-%m-%d").to_string(),
                            "date_str": day_label(*date),
                            "list": list,
                        })
                    })
                    .collect();
                (category.to_string(), Value::Array(days))
            })
            .collect();
        self.put(&self.keys.data(RECOMMEND_KEY), &Value::Object(payload).to_string())
            .await;
    }

    /// Write a version marker for a domain key.
    pub async fn set_marker(&self, domain_key: &str, marker: &str) {
        self.put(&self.keys.marker(domain_key), marker).await;
    }

    /// Write a raw value, bypassing counters and failure mode.
    pub async fn put(&self, key: &str, value: &str) {
        let _ = self.inner.set(key, value).await;
    }

    fn check_available(&self, command: &str, key: &str) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Command {
                command: command.to_string(),
                key: key.to_string(),
                reason: "store unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl StructuredStore for CountingStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        *locked(&self.gets).entry(key.to_string()).or_insert(0) += 1;
        self.check_available("GET", key)?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check_available("SET", key)?;
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value).await
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, StoreError> {
        self.check_available("DEL", &keys.join(" "))?;
        locked(&self.deleted).extend(keys.iter().cloned());
        self.inner.delete(keys).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available("PING", "")?;
        Ok(())
    }
}

/// Search oracle answering with a fixed date list and recording queries.
#[derive(Debug, Default)]
pub struct StubOracle {
    dates: Mutex<Vec<NaiveDate>>,
    queries: Mutex<Vec<OracleQuery>>,
    failing: AtomicBool,
}

impl StubOracle {
    pub fn with_dates(dates: Vec<NaiveDate>) -> Self {
        Self {
            dates: Mutex::new(dates),
            ..Self::default()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn queries(&self) -> Vec<OracleQuery> {
        locked(&self.queries).clone()
    }
}

#[async_trait]
impl SearchOracle for StubOracle {
    async fn dates_with_matches(&self, query: &OracleQuery) -> Result<Vec<NaiveDate>, SourceError> {
        locked(&self.queries).push(query.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::Status {
                source_name: "search-oracle".to_string(),
                status: 503,
            });
        }
        let mut dates: Vec<NaiveDate> = locked(&self.dates)
            .iter()
            .copied()
            .filter(|d| *d >= query.start && *d <= query.end)
            .collect();
        dates.sort_by(|a, b| b.cmp(a));
        Ok(dates)
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Record and date builders.

    use super::*;

    pub fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
    }

    /// Uncategorized record as the static feed publishes it.
    pub fn match_record(id: &str, start_time: i64, labels: &str) -> MatchRecord {
        record_from(json!({
            "saishi_id": id,
            "start_time": start_time.to_string(),
            "label": labels,
            "home_team": format!("home-{id}"),
            "away_team": format!("away-{id}"),
        }))
    }

    /// Record carrying a category (league) id.
    pub fn league_record(id: &str, start_time: i64, category: &str) -> MatchRecord {
        record_from(json!({
            "saishi_id": id,
            "start_time": start_time.to_string(),
            "label": "电竞",
            "pgame_league_id": category,
        }))
    }

    pub fn record_from(value: Value) -> MatchRecord {
        match value {
            Value::Object(fields) => MatchRecord::new(fields),
            _ => MatchRecord::default(),
        }
    }

    /// Engine config with the production windows, for a frozen `today`.
    pub fn engine_at(today: NaiveDate) -> (EngineConfig, FixedClock) {
        (EngineConfig::default(), FixedClock::new(today))
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for match records.

    use super::*;
    use proptest::prelude::*;

    /// Record with an id from a small pool so collisions are common.
    pub fn arb_record() -> impl Strategy<Value = MatchRecord> {
        (0u32..12, 0i64..5_000, prop::bool::ANY).prop_map(|(id, start, numeric)| {
            let id_value = if numeric { json!(id) } else { json!(id.to_string()) };
            fixtures::record_from(json!({
                "saishi_id": id_value,
                "start_time": start.to_string(),
                "label": "足球",
            }))
        })
    }

    pub fn arb_records(max: usize) -> impl Strategy<Value = Vec<MatchRecord>> {
        prop::collection::vec(arb_record(), 0..max)
    }

    /// Categorized payload: up to three categories with their records.
    pub fn arb_categorized(max: usize) -> impl Strategy<Value = Vec<(String, Vec<MatchRecord>)>> {
        prop::collection::vec(
            (prop::sample::select(vec!["11", "3729", "501"]), arb_records(max)),
            0..3,
        )
        .prop_map(|pairs| {
            pairs
                .into_iter()
                .map(|(category, records)| (category.to_string(), records))
                .collect()
        })
    }
}
