//! Application Configuration Module
//!
//! Process configuration is read once at startup from `MATCHDAY_*`
//! environment variables, with production defaults for everything except
//! credentials.

use std::net::SocketAddr;
use std::time::Duration;

use matchday_core::{ConfigError, EngineConfig, DEFAULT_UTC_OFFSET_HOURS};
use matchday_storage::{redact_url, DEFAULT_NAMESPACE};

use crate::constants::{DEFAULT_PORT, DEFAULT_STATIC_FEED_URL};

// ============================================================================
// SEARCH ORACLE
// ============================================================================

/// Connection settings of the search index.
#[derive(Clone)]
pub struct SearchConfig {
    /// Full `_search` endpoint of the schedule index.
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

// ============================================================================
// APP CONFIGURATION
// ============================================================================

#[derive(Clone)]
pub struct AppConfig {
    pub bind: String,
    pub port: u16,
    pub debug: bool,

    // ========================================================================
    // Sources
    // ========================================================================
    /// Redis URL of the structured store; `None` selects the in-memory store.
    pub redis_url: Option<String>,
    pub store_namespace: String,
    pub static_feed_url: String,
    pub search: Option<SearchConfig>,

    /// Shared secret of the admin routes; `None` disables them.
    pub admin_secret: Option<String>,

    pub utc_offset_hours: i32,
    pub engine: EngineConfig,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind", &self.bind)
            .field("port", &self.port)
            .field("debug", &self.debug)
            .field("redis_url", &self.redis_url.as_deref().map(redact_url))
            .field("store_namespace", &self.store_namespace)
            .field("static_feed_url", &self.static_feed_url)
            .field("search", &self.search)
            .field("admin_secret", &self.admin_secret.as_ref().map(|_| "<redacted>"))
            .field("utc_offset_hours", &self.utc_offset_hours)
            .field("engine", &self.engine)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            debug: false,
            redis_url: None,
            store_namespace: DEFAULT_NAMESPACE.to_string(),
            static_feed_url: DEFAULT_STATIC_FEED_URL.to_string(),
            search: None,
            admin_secret: None,
            utc_offset_hours: DEFAULT_UTC_OFFSET_HOURS,
            engine: EngineConfig::default(),
        }
    }
}

impl AppConfig {
    /// Create AppConfig from environment variables.
    ///
    /// Environment variables:
    /// - `MATCHDAY_BIND`: Listen address (default: 0.0.0.0)
    /// - `PORT` / `MATCHDAY_PORT`: Listen port (default: 8080)
    /// - `MATCHDAY_DEBUG`: "true" or "1" for text logs
    /// - `MATCHDAY_REDIS_URL`: Structured store (default: in-memory)
    /// - `MATCHDAY_STORE_NAMESPACE`: Key prefix (default: pgame:)
    /// - `MATCHDAY_STATIC_FEED_URL`: Base URL of the per-day feed
    /// - `MATCHDAY_SEARCH_URL` / `_USER` / `_PASSWORD`: Search oracle
    /// - `MATCHDAY_ADMIN_SECRET`: Admin shared secret
    /// - `MATCHDAY_FETCH_TIMEOUT_SECS`: Outbound call bound (default: 5)
    /// - `MATCHDAY_UTC_OFFSET_HOURS`: Zone of "today" (default: 8)
    /// - `MATCHDAY_RECENT_INTERVAL_SECS`, `MATCHDAY_EXTENDED_INTERVAL_SECS`,
    ///   `MATCHDAY_CLEANUP_INTERVAL_SECS`, `MATCHDAY_RETENTION_DAYS`,
    ///   `MATCHDAY_LOOKBACK_DAYS`: Engine overrides
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match non_empty("PORT").or_else(|| non_empty("MATCHDAY_PORT")) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                field: "MATCHDAY_PORT".to_string(),
                value: raw.clone(),
                reason: "must be a port number".to_string(),
            })?,
            None => defaults.port,
        };

        // Zero would stall every fetch or panic the tier timers.
        let secs = |name: &str, default: Duration| match non_empty(name) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
                _ => Err(ConfigError::InvalidValue {
                    field: name.to_string(),
                    value: raw.clone(),
                    reason: "must be a positive number of seconds".to_string(),
                }),
            },
            None => Ok(default),
        };
        let days = |name: &str, default: u32| {
            non_empty(name)
                .and_then(|s| s.trim().parse::<u32>().ok())
                .unwrap_or(default)
        };

        let base = EngineConfig::default();
        let engine = EngineConfig::default()
            .with_recent_interval(secs("MATCHDAY_RECENT_INTERVAL_SECS", base.recent_interval)?)
            .with_extended_interval(secs("MATCHDAY_EXTENDED_INTERVAL_SECS", base.extended_interval)?)
            .with_cleanup_interval(secs("MATCHDAY_CLEANUP_INTERVAL_SECS", base.cleanup_interval)?)
            .with_retention_days(days("MATCHDAY_RETENTION_DAYS", base.retention_days))
            .with_lookback_days(days("MATCHDAY_LOOKBACK_DAYS", base.lookback_days))
            .with_fetch_timeout(secs("MATCHDAY_FETCH_TIMEOUT_SECS", base.fetch_timeout)?);

        let search = non_empty("MATCHDAY_SEARCH_URL").map(|url| SearchConfig {
            url,
            user: non_empty("MATCHDAY_SEARCH_USER"),
            password: non_empty("MATCHDAY_SEARCH_PASSWORD"),
        });

        Ok(Self {
            bind: non_empty("MATCHDAY_BIND").unwrap_or(defaults.bind),
            port,
            debug: lookup("MATCHDAY_DEBUG")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(false),
            redis_url: non_empty("MATCHDAY_REDIS_URL"),
            store_namespace: lookup("MATCHDAY_STORE_NAMESPACE").unwrap_or(defaults.store_namespace),
            static_feed_url: non_empty("MATCHDAY_STATIC_FEED_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.static_feed_url),
            search,
            admin_secret: non_empty("MATCHDAY_ADMIN_SECRET"),
            utc_offset_hours: non_empty("MATCHDAY_UTC_OFFSET_HOURS")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.utc_offset_hours),
            engine,
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.bind, self.port);
        addr.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue {
                field: "MATCHDAY_BIND".to_string(),
                value: addr.clone(),
                reason: e.to_string(),
            })
    }
}
