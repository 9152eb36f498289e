//! Tunables of the cache/refresh engine.

use std::time::Duration;

use crate::entities::RefreshWindow;

/// Engine timing and window configuration.
///
/// Defaults reproduce the production cadence: a 10 second recent tier over the
/// last 10 days, an hourly extended tier over days 10 to 30, and a daily sweep
/// at the 180 day retention horizon.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Days kept forever in memory and refreshed by the recent tier.
    pub recent_days: u32,
    /// Upper bound of the extended tier; also the query-time walk length.
    pub extended_days: u32,
    pub recent_interval: Duration,
    pub extended_interval: Duration,
    pub cleanup_interval: Duration,
    /// TTL of days in the extended tier.
    pub extended_ttl: Duration,
    /// TTL of days beyond the extended tier.
    pub archive_ttl: Duration,
    pub retention_days: u32,
    /// Oldest requestable day, counted back from today.
    pub lookback_days: u32,
    /// Per-call bound on outbound fetches.
    pub fetch_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            recent_days: 10,
            extended_days: 30,
            recent_interval: Duration::from_secs(10),
            extended_interval: Duration::from_secs(60 * 60),
            cleanup_interval: Duration::from_secs(24 * 60 * 60),
            extended_ttl: Duration::from_secs(60 * 60),
            archive_ttl: Duration::from_secs(24 * 60 * 60),
            retention_days: 180,
            lookback_days: 180,
            fetch_timeout: Duration::from_secs(5),
        }
    }
}

impl EngineConfig {
    pub fn with_recent_interval(mut self, interval: Duration) -> Self {
        self.recent_interval = interval;
        self
    }

    pub fn with_extended_interval(mut self, interval: Duration) -> Self {
        self.extended_interval = interval;
        self
    }

    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    pub fn with_lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = days;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn recent_window(&self) -> RefreshWindow {
        RefreshWindow::new(0, self.recent_days)
    }

    pub fn extended_window(&self) -> RefreshWindow {
        RefreshWindow::new(self.recent_days, self.extended_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_windows() {
        let config = EngineConfig::default();
        assert_eq!(config.recent_window(), RefreshWindow::new(0, 10));
        assert_eq!(config.extended_window(), RefreshWindow::new(10, 30));
    }

    #[test]
    fn test_builders() {
        let config = EngineConfig::default()
            .with_retention_days(90)
            .with_lookback_days(60)
            .with_recent_interval(Duration::from_secs(1))
            .with_fetch_timeout(Duration::from_secs(3));
        assert_eq!(config.retention_days, 90);
        assert_eq!(config.lookback_days, 60);
        assert_eq!(config.recent_interval, Duration::from_secs(1));
        assert_eq!(config.fetch_timeout, Duration::from_secs(3));
    }
}
