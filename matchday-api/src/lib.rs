//! Matchday API - refresh engine and HTTP read API
//!
//! Serves date-scoped match listings out of a tiered in-memory cache that is
//! kept fresh by a background scheduler and filled on demand from the static
//! feed and the structured store.

pub mod config;
pub mod constants;
pub mod error;
pub mod jobs;
pub mod macros;
pub mod routes;
pub mod services;
pub mod sources;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::{AppConfig, SearchConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use jobs::{CycleReport, RefreshScheduler, SchedulerSnapshot, SweepReport};
pub use routes::create_router;
pub use services::{
    DayFetch, DayFetcher, MatchList, MatchListAssembler, RecommendationService, RefreshOutcome,
};
pub use sources::{connect, HttpSearchOracle, HttpStaticFeed, Sources};
pub use state::{AppState, EngineCache};
