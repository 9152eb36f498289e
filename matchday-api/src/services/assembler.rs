//! Query-time assembly of the paginated match list.
//!
//! A request names a day; the assembler walks backward from it through the
//! cache until a day has records that pass the caller's filters. Cache misses
//! are filled synchronously from the sources.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Months, NaiveDate};
use matchday_core::{
    age_in_days, finished_key, selects, CategoryFilter, Clock, DayRecordSet, EngineConfig,
    InterestFilter, MatchRecord, OracleQuery, SearchOracle,
};
use matchday_storage::{CachedSet, ExpirationPolicy, TieredCache, VersionGate};
use tracing::{debug, warn};

use super::{apply_day, DayFetcher, RefreshOutcome};
use crate::constants::ORACLE_LOOKBACK_MONTHS;

/// Answer of a list query.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchList {
    /// First day at or before the requested one with matching records.
    Found {
        set: DayRecordSet,
        /// Cursor for the client's next page.
        next_date: NaiveDate,
    },
    Empty,
}

impl MatchList {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

pub struct MatchListAssembler {
    fetcher: Arc<DayFetcher>,
    cache: Arc<TieredCache<CachedSet>>,
    gate: Arc<VersionGate>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    oracle: Option<Arc<dyn SearchOracle>>,
}

impl MatchListAssembler {
    pub fn new(
        fetcher: Arc<DayFetcher>,
        cache: Arc<TieredCache<CachedSet>>,
        gate: Arc<VersionGate>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            fetcher,
            cache,
            gate,
            clock,
            config,
            oracle: None,
        }
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn SearchOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn oracle_enabled(&self) -> bool {
        self.oracle.is_some()
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    fn beyond_lookback(&self, date: NaiveDate, today: NaiveDate) -> bool {
        age_in_days(date, today) > i64::from(self.config.lookback_days)
    }

    /// Walk backward from `requested` over at most `extended_days` days.
    ///
    /// Requests past the lookback bound answer empty without touching any
    /// source, and the walk itself stops at that bound. Future dates are
    /// clamped to today.
    pub async fn list(
        &self,
        requested: NaiveDate,
        interests: &InterestFilter,
        categories: &CategoryFilter,
    ) -> MatchList {
        let today = self.clock.today();
        if self.beyond_lookback(requested, today) {
            debug!(requested = %requested, "request beyond lookback bound");
            return MatchList::Empty;
        }

        let start = requested.min(today);
        for offset in 0..self.config.extended_days {
            let date = start - ChronoDuration::days(i64::from(offset));
            if self.beyond_lookback(date, today) {
                break;
            }
            let day = self.filtered_day(date, today, interests, categories).await;
            if !day.is_empty() {
                return MatchList::Found {
                    set: day,
                    next_date: date - ChronoDuration::days(1),
                };
            }
        }
        MatchList::Empty
    }

    /// Legacy path: let the search oracle name the candidate days.
    pub async fn list_via_oracle(
        &self,
        requested: NaiveDate,
        interests: &InterestFilter,
        categories: &CategoryFilter,
    ) -> MatchList {
        let Some(oracle) = &self.oracle else {
            return MatchList::Empty;
        };
        let today = self.clock.today();
        if self.beyond_lookback(requested, today) {
            return MatchList::Empty;
        }

        let query = OracleQuery {
            start: today
                .checked_sub_months(Months::new(ORACLE_LOOKBACK_MONTHS))
                .unwrap_or(today),
            end: requested,
            labels: interests.tags().map(str::to_string).collect(),
        };
        let dates = match oracle.dates_with_matches(&query).await {
            Ok(dates) => dates,
            Err(err) => {
                warn!(error = %err, requested = %requested, "search oracle failed");
                return MatchList::Empty;
            }
        };

        for (index, date) in dates.iter().copied().enumerate() {
            let day = self.filtered_day(date, today, interests, categories).await;
            if !day.is_empty() {
                let next_date = dates
                    .get(index + 1)
                    .copied()
                    .unwrap_or(date - ChronoDuration::days(1));
                return MatchList::Found { set: day, next_date };
            }
        }
        MatchList::Empty
    }

    async fn filtered_day(
        &self,
        date: NaiveDate,
        today: NaiveDate,
        interests: &InterestFilter,
        categories: &CategoryFilter,
    ) -> DayRecordSet {
        let keep = |record: &MatchRecord| selects(record, interests, categories);
        if let Some(cached) = self.cache.get(&finished_key(date)) {
            if let Some(day) = cached.as_day() {
                return day.filtered(keep);
            }
        }
        self.pull_through(date, today).await.filtered(keep)
    }

    async fn pull_through(&self, date: NaiveDate, today: NaiveDate) -> DayRecordSet {
        debug!(date = %date, "cache miss, fetching day");
        let fetch = self.fetcher.fetch_day(date).await;
        let policy = ExpirationPolicy::for_age(date, today, &self.config);
        let set = fetch.set.clone();
        apply_day(&self.cache, &self.gate, fetch, policy);
        set
    }

    /// Fetch one day now, bypassing the version gate.
    pub async fn refresh_day(&self, date: NaiveDate) -> RefreshOutcome {
        let today = self.clock.today();
        let fetch = self.fetcher.fetch_day(date).await;
        let degraded = fetch.degraded;
        let policy = ExpirationPolicy::for_age(date, today, &self.config);
        match (apply_day(&self.cache, &self.gate, fetch, policy), degraded) {
            (true, _) => RefreshOutcome::Written,
            (false, true) => RefreshOutcome::Failed,
            (false, false) => RefreshOutcome::Unchanged,
        }
    }

    /// Cached content of one day, if any.
    pub fn cached_day(&self, date: NaiveDate) -> Option<DayRecordSet> {
        self.cache
            .get(&finished_key(date))
            .and_then(|cached| cached.as_day().cloned())
    }
}
