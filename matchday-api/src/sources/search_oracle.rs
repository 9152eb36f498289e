//! Client of the schedule search index, used only to learn which dates have
//! matching records.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use matchday_core::{format_date, parse_date, OracleQuery, SearchOracle, SourceError};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::transport_error;
use crate::config::SearchConfig;
use crate::constants::{ORACLE_DATE_BUCKETS, ORACLE_MATCH_STATES, SEARCH_ORACLE_SOURCE};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    aggregations: Option<Aggregations>,
}

#[derive(Debug, Deserialize)]
struct Aggregations {
    group_by_date: DateBuckets,
}

#[derive(Debug, Deserialize)]
struct DateBuckets {
    #[serde(default)]
    buckets: Vec<DateBucket>,
}

#[derive(Debug, Deserialize)]
struct DateBucket {
    #[serde(default)]
    key_as_string: Option<String>,
    #[serde(default)]
    key: Value,
}

impl DateBucket {
    fn date(&self) -> Option<NaiveDate> {
        let raw = match (&self.key_as_string, &self.key) {
            (Some(text), _) => text.as_str(),
            (None, Value::String(text)) => text.as_str(),
            _ => return None,
        };
        // Date-typed fields render with a time part.
        parse_date(raw.get(..10).unwrap_or(raw))
    }
}

/// Search oracle over HTTP with optional basic auth.
#[derive(Clone)]
pub struct HttpSearchOracle {
    client: Client,
    config: SearchConfig,
    timeout: Duration,
}

impl std::fmt::Debug for HttpSearchOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSearchOracle")
            .field("config", &self.config)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpSearchOracle {
    pub fn new(config: SearchConfig, timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::http(SEARCH_ORACLE_SOURCE, e))?;
        Ok(Self {
            client,
            config,
            timeout,
        })
    }
}

/// Aggregation query: visible matches in the given states, inside the date
/// range, tagged with any of the labels, bucketed by date newest first.
pub fn build_query(query: &OracleQuery) -> Value {
    let labels: Vec<String> = query.labels.iter().map(|l| l.to_lowercase()).collect();
    json!({
        "_source": ["saishi_id", "type", "s_date"],
        "query": {
            "bool": {
                "filter": [
                    { "terms": { "state": ORACLE_MATCH_STATES } },
                    { "term": { "is_visible": 1 } },
                    { "range": { "s_date": {
                        "gte": format_date(query.start),
                        "lte": format_date(query.end),
                    } } },
                    { "terms": { "label_has_rec.label_text": labels } },
                ]
            }
        },
        "aggs": {
            "group_by_date": {
                "terms": {
                    "field": "s_date",
                    "size": ORACLE_DATE_BUCKETS,
                    "order": { "_key": "desc" },
                }
            }
        },
        "size": 0,
    })
}

fn parse_dates(body: &[u8]) -> Result<Vec<NaiveDate>, SourceError> {
    let response: SearchResponse =
        serde_json::from_slice(body).map_err(|e| SourceError::decode(SEARCH_ORACLE_SOURCE, e))?;
    let mut dates: Vec<NaiveDate> = response
        .aggregations
        .map(|aggs| aggs.group_by_date.buckets)
        .unwrap_or_default()
        .iter()
        .filter_map(DateBucket::date)
        .collect();
    dates.sort_by(|a, b| b.cmp(a));
    dates.dedup();
    Ok(dates)
}

#[async_trait]
impl SearchOracle for HttpSearchOracle {
    async fn dates_with_matches(&self, query: &OracleQuery) -> Result<Vec<NaiveDate>, SourceError> {
        if query.labels.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self.client.post(&self.config.url).json(&build_query(query));
        if let Some(user) = &self.config.user {
            request = request.basic_auth(user, self.config.password.as_ref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(SEARCH_ORACLE_SOURCE, self.timeout, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                source_name: SEARCH_ORACLE_SOURCE.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(SEARCH_ORACLE_SOURCE, self.timeout, e))?;
        let dates = parse_dates(&body)?;
        debug!(dates = dates.len(), start = %query.start, end = %query.end, "oracle answered");
        Ok(dates)
    }
}
