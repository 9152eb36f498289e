//! Constants for the Matchday API

// ============================================================================
// SERVER
// ============================================================================

pub const DEFAULT_PORT: u16 = 8080;

// ============================================================================
// SOURCES
// ============================================================================

/// Base URL of the per-day static feed; requests go to `<base>/<date>.htm`.
pub const DEFAULT_STATIC_FEED_URL: &str = "http://s.qiumibao.com/json/record";

/// Source names used in errors and log fields.
pub const STATIC_FEED_SOURCE: &str = "static-feed";
pub const STRUCTURED_STORE_SOURCE: &str = "structured-store";
pub const SEARCH_ORACLE_SOURCE: &str = "search-oracle";

/// Match states the search oracle counts: live, finished, postponed, interrupted.
pub const ORACLE_MATCH_STATES: [&str; 4] = ["2", "3", "4", "5"];

/// Maximum number of date buckets asked from the search oracle.
pub const ORACLE_DATE_BUCKETS: usize = 30;

/// The oracle path only looks this many months back from today.
pub const ORACLE_LOOKBACK_MONTHS: u32 = 1;

// ============================================================================
// READ API
// ============================================================================

/// Placeholder clients send instead of a date on the first page.
pub const DATE_PLACEHOLDER: &str = "__DATE-__";

pub const NO_DATA_MSG: &str = "暂无数据";
pub const INVALID_DATE_MSG: &str = "日期格式错误";
pub const INVALID_PARAMS_MSG: &str = "参数错误";
pub const OK_MSG: &str = "成功";

/// Content type of JSONP responses.
pub const JSONP_CONTENT_TYPE: &str = "application/javascript; charset=utf-8";

/// Longest accepted JSONP callback name.
pub const MAX_CALLBACK_LEN: usize = 64;

// ============================================================================
// ADMIN
// ============================================================================

pub const REFRESH_TYPE_RECOMMEND: &str = "recommend";
pub const REFRESH_TYPE_FINISHED: &str = "finished";
