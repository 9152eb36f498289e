//! Matchday Core - Entity Types
//!
//! Data shapes, source boundaries and the error taxonomy shared by the
//! storage layer and the API service. No I/O lives here.

pub mod calendar;
pub mod config;
pub mod entities;
pub mod error;
pub mod filter;
pub mod sources;

pub use calendar::{
    age_in_days, day_label, format_date, parse_date, Clock, FixedClock, SystemClock, DATE_FORMAT,
    DEFAULT_UTC_OFFSET_HOURS,
};
pub use config::EngineConfig;
pub use entities::{
    finished_key, marker_key, DayGroup, DayRecordSet, MatchRecord, RecommendationSet,
    RefreshWindow, StaticDay, VersionMarker, CATEGORY_FIELD, LABEL_FIELD, MATCH_ID_FIELD,
    RECOMMEND_KEY, START_TIME_FIELD,
};
pub use error::{ConfigError, MatchdayError, MatchdayResult, SourceError, StoreError};
pub use filter::{selects, CategoryFilter, InterestFilter, CATCH_ALL_TAGS};
pub use sources::{OracleQuery, SearchOracle, StaticFeed, StructuredStore};
