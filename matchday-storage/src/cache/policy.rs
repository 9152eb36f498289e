//! Age-based expiration tiers.

use std::time::Duration;

use chrono::NaiveDate;
use matchday_core::{age_in_days, EngineConfig};
use tokio::time::Instant;

/// How long a cache entry may live once written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpirationPolicy {
    /// Kept until deleted or replaced.
    Never,
    /// Dropped once the duration has elapsed since the write.
    After(Duration),
}

impl ExpirationPolicy {
    /// Policy for a day of the given age.
    ///
    /// Recent days never expire since the scheduler keeps them fresh; older
    /// days are effectively immutable and may fall out of memory.
    pub fn for_age(date: NaiveDate, today: NaiveDate, config: &EngineConfig) -> Self {
        let age = age_in_days(date, today);
        if age <= i64::from(config.recent_days) {
            Self::Never
        } else if age <= i64::from(config.extended_days) {
            Self::After(config.extended_ttl)
        } else {
            Self::After(config.archive_ttl)
        }
    }

    pub fn deadline(&self, written_at: Instant) -> Option<Instant> {
        match self {
            Self::Never => None,
            Self::After(ttl) => Some(written_at + *ttl),
        }
    }
}
