//! Entity types shared by every matchday crate.

use std::collections::BTreeMap;
use std::ops::Range;

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field carrying the match identifier used for deduplication.
pub const MATCH_ID_FIELD: &str = "saishi_id";
/// Field carrying the start time in epoch seconds.
pub const START_TIME_FIELD: &str = "start_time";
/// Comma separated tag list.
pub const LABEL_FIELD: &str = "label";
/// League / category id. Only structured-store records carry it.
pub const CATEGORY_FIELD: &str = "pgame_league_id";
const DATA_TYPE_FIELD: &str = "data_type";
const COLLECTION_DATA_TYPE: &str = "schedule_collection";
const COLLECTION_LIST_FIELD: &str = "list";

// ============================================================================
// MATCH RECORD
// ============================================================================

/// A single match as published by one of the sources.
///
/// The record is kept as the raw JSON object so that every field the sources
/// publish is re-emitted untouched; the accessors below read the handful of
/// fields the engine needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchRecord(Map<String, Value>);

impl MatchRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Match identifier (`saishi_id`), accepting string or integer encodings.
    pub fn match_id(&self) -> Option<String> {
        scalar_field(&self.0, MATCH_ID_FIELD)
    }

    /// Start time in epoch seconds; missing or malformed values sort last.
    pub fn start_time(&self) -> i64 {
        match self.0.get(START_TIME_FIELD) {
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
            Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
            _ => 0,
        }
    }

    /// Category (league) id, if the record carries one.
    pub fn category(&self) -> Option<String> {
        scalar_field(&self.0, CATEGORY_FIELD)
    }

    /// Stamp a category id onto the record unless it already has one.
    pub fn with_category(mut self, category: &str) -> Self {
        if self.category().is_none() {
            self.0
                .insert(CATEGORY_FIELD.to_string(), Value::String(category.to_string()));
        }
        self
    }

    /// Tags of this record. Collections contribute the tags of their children.
    pub fn labels(&self) -> Vec<String> {
        let mut labels = split_labels(&self.0);

        let is_collection = matches!(
            self.0.get(DATA_TYPE_FIELD),
            Some(Value::String(kind)) if kind == COLLECTION_DATA_TYPE
        );
        if is_collection {
            if let Some(Value::Array(children)) = self.0.get(COLLECTION_LIST_FIELD) {
                for child in children {
                    if let Value::Object(child) = child {
                        labels.extend(split_labels(child));
                    }
                }
            }
        }

        let mut seen = std::collections::HashSet::new();
        labels.retain(|label| seen.insert(label.clone()));
        labels
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for MatchRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

fn scalar_field(fields: &Map<String, Value>, name: &str) -> Option<String> {
    match fields.get(name) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn split_labels(fields: &Map<String, Value>) -> Vec<String> {
    match fields.get(LABEL_FIELD) {
        Some(Value::String(raw)) => raw
            .split(',')
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

// ============================================================================
// DAY RECORD SET
// ============================================================================

/// One calendar day's merged match list.
///
/// `items` is unique by match id and sorted by descending start time. A set is
/// never mutated once cached; refreshes build a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayRecordSet {
    pub date: NaiveDate,
    #[serde(rename = "date_str")]
    pub label: String,
    #[serde(rename = "list")]
    pub items: Vec<MatchRecord>,
    #[serde(rename = "update_at")]
    pub updated_at: DateTime<Utc>,
}

impl DayRecordSet {
    pub fn new(date: NaiveDate, label: impl Into<String>, items: Vec<MatchRecord>) -> Self {
        Self {
            date,
            label: label.into(),
            items,
            updated_at: Utc::now(),
        }
    }

    /// Content equality: the ordered item lists match, timestamps ignored.
    pub fn same_content(&self, other: &Self) -> bool {
        self.items == other.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Copy of this set keeping only the records accepted by `keep`.
    pub fn filtered<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&MatchRecord) -> bool,
    {
        Self {
            date: self.date,
            label: self.label.clone(),
            items: self.items.iter().filter(|r| keep(r)).cloned().collect(),
            updated_at: self.updated_at,
        }
    }
}

// ============================================================================
// RECOMMENDATIONS
// ============================================================================

/// Promoted matches of one category on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayGroup {
    #[serde(rename = "formatDate")]
    pub format_date: NaiveDate,
    /// Localized label, e.g. `1月12日 星期一`.
    pub date: String,
    pub list: Vec<MatchRecord>,
}

/// Global recommendation structure: category id -> day groups (ascending).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSet {
    #[serde(rename = "data")]
    pub by_category: BTreeMap<String, Vec<DayGroup>>,
    #[serde(rename = "update_at")]
    pub updated_at: DateTime<Utc>,
}

impl RecommendationSet {
    pub fn new(by_category: BTreeMap<String, Vec<DayGroup>>) -> Self {
        Self {
            by_category,
            updated_at: Utc::now(),
        }
    }

    pub fn same_content(&self, other: &Self) -> bool {
        self.by_category == other.by_category
    }

    /// Number of day groups across all categories.
    pub fn group_count(&self) -> usize {
        self.by_category.values().map(Vec::len).sum()
    }
}

// ============================================================================
// SOURCE PAYLOADS
// ============================================================================

/// Body of `GET <base>/<date>.htm`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticDay {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub date_str: String,
    #[serde(default)]
    pub list: Vec<MatchRecord>,
}

/// Opaque change marker published next to a structured-store domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionMarker(String);

impl VersionMarker {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The marker observed when the store has no marker for a domain.
    pub fn absent() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// REFRESH WINDOW
// ============================================================================

/// Half-open day-offset range `[start, end)` counted backward from today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshWindow {
    start: u32,
    end: u32,
}

impl RefreshWindow {
    pub fn new(start: u32, end: u32) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn offsets(&self) -> Range<u32> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Calendar dates touched by this window, newest first.
    pub fn dates(&self, today: NaiveDate) -> impl Iterator<Item = NaiveDate> {
        self.offsets()
            .map(move |offset| today - ChronoDuration::days(i64::from(offset)))
    }
}

// ============================================================================
// DOMAIN KEYS
// ============================================================================

/// Cache / version domain key of the recommendation set.
pub const RECOMMEND_KEY: &str = "recommend";

/// Cache / version domain key of one finished-match day.
pub fn finished_key(date: NaiveDate) -> String {
    format!("finished:{}", date.format(crate::DATE_FORMAT))
}

/// Store key holding the version marker of a domain.
pub fn marker_key(domain_key: &str) -> String {
    format!("{}:code", domain_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> MatchRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_match_record_accessors() {
        let r = record(json!({
            "saishi_id": "1001",
            "start_time": "1750400000",
            "label": "足球,英超",
            "pgame_league_id": 3729
        }));
        assert_eq!(r.match_id().as_deref(), Some("1001"));
        assert_eq!(r.start_time(), 1_750_400_000);
        assert_eq!(r.labels(), vec!["足球".to_string(), "英超".to_string()]);
        assert_eq!(r.category().as_deref(), Some("3729"));
    }

    #[test]
    fn test_match_record_numeric_id_and_bad_start_time() {
        let r = record(json!({"saishi_id": 42, "start_time": "soon"}));
        assert_eq!(r.match_id().as_deref(), Some("42"));
        assert_eq!(r.start_time(), 0);
        assert!(r.labels().is_empty());
        assert!(r.category().is_none());
    }

    #[test]
    fn test_collection_labels_include_children() {
        let r = record(json!({
            "saishi_id": "c1",
            "label": "综合",
            "data_type": "schedule_collection",
            "list": [
                {"label": "网球"},
                {"label": "综合,斯诺克"}
            ]
        }));
        assert_eq!(
            r.labels(),
            vec!["综合".to_string(), "网球".to_string(), "斯诺克".to_string()]
        );
    }

    #[test]
    fn test_with_category_keeps_existing() {
        let stamped = record(json!({"saishi_id": "1"})).with_category("3729");
        assert_eq!(stamped.category().as_deref(), Some("3729"));

        let kept = record(json!({"saishi_id": "1", "pgame_league_id": "11"})).with_category("3729");
        assert_eq!(kept.category().as_deref(), Some("11"));
    }

    #[test]
    fn test_day_record_set_content_ignores_timestamp() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 20).unwrap();
        let items = vec![record(json!({"saishi_id": "1"}))];
        let a = DayRecordSet::new(date, "6月20日 星期五", items.clone());
        let mut b = DayRecordSet::new(date, "6月20日 星期五", items);
        b.updated_at = a.updated_at + ChronoDuration::seconds(30);
        assert!(a.same_content(&b));
    }

    #[test]
    fn test_day_record_set_wire_names() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 20).unwrap();
        let set = DayRecordSet::new(date, "6月20日 星期五", vec![]);
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json["date"], "2025-06-20");
        assert_eq!(json["date_str"], "6月20日 星期五");
        assert!(json["list"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_refresh_window_dates() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
        let window = RefreshWindow::new(0, 3);
        let dates: Vec<_> = window.dates(today).collect();
        assert_eq!(window.len(), 3);
        assert_eq!(dates[0], today);
        assert_eq!(dates[2], NaiveDate::from_ymd_opt(2025, 6, 28).unwrap());
        assert!(RefreshWindow::new(5, 2).is_empty());
    }

    #[test]
    fn test_inverted_refresh_window_is_empty() {
        let window = RefreshWindow::new(30, 10);
        assert_eq!((window.start(), window.end()), (30, 30));
        assert_eq!(window.len(), 0);
        assert_eq!(window.offsets().count(), 0);
    }

    #[test]
    fn test_domain_keys() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 20).unwrap();
        assert_eq!(finished_key(date), "finished:2025-06-20");
        assert_eq!(marker_key(&finished_key(date)), "finished:2025-06-20:code");
        assert_eq!(marker_key(RECOMMEND_KEY), "recommend:code");
    }
}
