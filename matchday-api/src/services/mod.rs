//! Service Layer
//!
//! Engine logic sitting between the sources and the HTTP routes: the day
//! fetcher, the recommendation service and the query-time assembler.

mod assembler;
mod day_fetcher;
mod recommend;

pub use assembler::*;
pub use day_fetcher::*;
pub use recommend::*;

/// What a single refresh did to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The version marker had not moved; nothing was fetched.
    Skipped,
    /// Fetched, but the content equals what is cached.
    Unchanged,
    Written,
    /// A source failed and the cached value was kept.
    Failed,
}

impl RefreshOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Unchanged => "unchanged",
            Self::Written => "written",
            Self::Failed => "failed",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed)
    }
}
