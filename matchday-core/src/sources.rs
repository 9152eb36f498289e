//! Boundaries to the external sources of record.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::entities::StaticDay;
use crate::error::{SourceError, StoreError};

/// Per-day static content feed (`GET <base>/<date>.htm`).
#[async_trait]
pub trait StaticFeed: Send + Sync {
    async fn fetch_day(&self, date: NaiveDate) -> Result<StaticDay, SourceError>;
}

/// Versioned key/value store holding JSON payloads and their markers.
#[async_trait]
pub trait StructuredStore: Send + Sync {
    /// `Ok(None)` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete keys, returning how many existed.
    async fn delete(&self, keys: &[String]) -> Result<u64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Parameters of a "which dates have matches" lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub labels: Vec<String>,
}

/// Search index consulted only for the dates that carry matching records.
#[async_trait]
pub trait SearchOracle: Send + Sync {
    /// Dates in `[query.start, query.end]` with at least one match, newest first.
    async fn dates_with_matches(&self, query: &OracleQuery) -> Result<Vec<NaiveDate>, SourceError>;
}
