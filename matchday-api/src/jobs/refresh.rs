//! Refresh Scheduler
//!
//! Three independent periodic tiers keep the cache warm:
//!
//! - recent: the last `recent_days` days plus the recommendation set
//! - extended: days `recent_days..extended_days`
//! - cleanup: the retention sweep and the cache janitor
//!
//! A window cycle checks every day's version marker concurrently, fetches the
//! changed ones, and only after the whole fan-out has finished applies the
//! staged results to the cache one by one.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Duration as ChronoDuration, NaiveDate};
use futures_util::future::{join_all, BoxFuture};
use futures_util::FutureExt;
use matchday_core::{finished_key, Clock, EngineConfig, RefreshWindow, StructuredStore};
use matchday_storage::{CachedSet, ExpirationPolicy, StoreKeys, TieredCache, VersionGate};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::services::{apply_day, DayFetch, DayFetcher, RecommendationService, RefreshOutcome};

// ============================================================================
// METRICS
// ============================================================================

/// Counters of scheduler activity since startup.
#[derive(Debug, Default)]
pub struct SchedulerMetrics {
    /// Completed window cycles, all tiers.
    pub cycles: AtomicU64,
    /// Day fetches issued after the gate reported a change.
    pub fetches: AtomicU64,
    /// Cache writes that replaced content.
    pub writes: AtomicU64,
    /// Days skipped by the version gate.
    pub skipped: AtomicU64,
    pub sweeps: AtomicU64,
    /// Degraded fetches and failed store commands.
    pub failures: AtomicU64,
}

impl SchedulerMetrics {
    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SchedulerSnapshot {
    pub cycles: u64,
    pub fetches: u64,
    pub writes: u64,
    pub skipped: u64,
    pub sweeps: u64,
    pub failures: u64,
}

// ============================================================================
// REPORTS
// ============================================================================

/// Result of one window cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub skipped: usize,
    pub written: usize,
    pub failed: usize,
}

/// Result of one cleanup sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub date: NaiveDate,
    /// Store keys the backend reported as deleted.
    pub store_deleted: u64,
    pub cache_deleted: bool,
    pub purged: usize,
}

// ============================================================================
// SCHEDULER
// ============================================================================

/// Owner of the three refresh tiers.
pub struct RefreshScheduler {
    fetcher: Arc<DayFetcher>,
    recommendations: Arc<RecommendationService>,
    cache: Arc<TieredCache<CachedSet>>,
    gate: Arc<VersionGate>,
    store: Arc<dyn StructuredStore>,
    keys: StoreKeys,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    metrics: SchedulerMetrics,
    started: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl RefreshScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fetcher: Arc<DayFetcher>,
        recommendations: Arc<RecommendationService>,
        cache: Arc<TieredCache<CachedSet>>,
        gate: Arc<VersionGate>,
        store: Arc<dyn StructuredStore>,
        keys: StoreKeys,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            fetcher,
            recommendations,
            cache,
            gate,
            store,
            keys,
            clock,
            config,
            metrics: SchedulerMetrics::default(),
            started: AtomicBool::new(false),
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn metrics(&self) -> SchedulerSnapshot {
        self.metrics.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !*self.shutdown_tx.borrow()
    }

    /// Spawn the tier tasks. Only the first call does anything.
    pub fn start(self: &Arc<Self>) -> bool {
        if self.started.swap(true, Ordering::SeqCst) {
            return false;
        }

        let recent = self.config.recent_interval;
        let extended = self.config.extended_interval;
        let cleanup = self.config.cleanup_interval;

        let handles = vec![
            self.spawn_tier("recent", recent, |scheduler| {
                async move {
                    scheduler.run_window(scheduler.config.recent_window()).await;
                    scheduler.refresh_recommendations().await;
                }
                .boxed()
            }),
            self.spawn_tier("extended", extended, |scheduler| {
                async move {
                    scheduler.run_window(scheduler.config.extended_window()).await;
                }
                .boxed()
            }),
            self.spawn_tier("cleanup", cleanup, |scheduler| {
                async move {
                    scheduler.sweep().await;
                }
                .boxed()
            }),
        ];

        match self.handles.lock() {
            Ok(mut guard) => guard.extend(handles),
            Err(poisoned) => poisoned.into_inner().extend(handles),
        }

        tracing::info!(
            recent_interval_secs = recent.as_secs(),
            extended_interval_secs = extended.as_secs(),
            cleanup_interval_secs = cleanup.as_secs(),
            "Refresh scheduler started"
        );
        true
    }

    fn spawn_tier<F>(self: &Arc<Self>, tier: &'static str, period: Duration, tick: F) -> JoinHandle<()>
    where
        F: Fn(Arc<Self>) -> BoxFuture<'static, ()> + Send + 'static,
    {
        let scheduler = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; warm_up already covered it.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::info!(tier, "Refresh tier shutting down");
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        tick(Arc::clone(&scheduler)).await;
                    }
                }
            }
        })
    }

    /// One recent cycle and one recommendation refresh, awaited before the
    /// server takes traffic.
    pub async fn warm_up(&self) -> CycleReport {
        let report = self.run_window(self.config.recent_window()).await;
        self.refresh_recommendations().await;
        report
    }

    /// Gate, fetch and stage every day of `window`, then apply.
    pub async fn run_window(&self, window: RefreshWindow) -> CycleReport {
        let today = self.clock.today();

        let staged: Vec<Option<DayFetch>> = join_all(window.dates(today).map(|date| async move {
            if !self.gate.changed(&finished_key(date)).await {
                return None;
            }
            Some(self.fetcher.fetch_day(date).await)
        }))
        .await;

        let mut report = CycleReport::default();
        for fetch in staged {
            let Some(fetch) = fetch else {
                report.skipped += 1;
                continue;
            };
            report.fetched += 1;
            if fetch.degraded {
                report.failed += 1;
            }
            let policy = ExpirationPolicy::for_age(fetch.set.date, today, &self.config);
            if apply_day(&self.cache, &self.gate, fetch, policy) {
                report.written += 1;
            }
        }

        self.metrics.cycles.fetch_add(1, Ordering::Relaxed);
        self.metrics.fetches.fetch_add(report.fetched as u64, Ordering::Relaxed);
        self.metrics.writes.fetch_add(report.written as u64, Ordering::Relaxed);
        self.metrics.skipped.fetch_add(report.skipped as u64, Ordering::Relaxed);
        self.metrics.failures.fetch_add(report.failed as u64, Ordering::Relaxed);

        if report.written > 0 || report.failed > 0 {
            tracing::info!(
                start = window.start(),
                end = window.end(),
                fetched = report.fetched,
                written = report.written,
                failed = report.failed,
                "Refresh cycle completed"
            );
        } else {
            tracing::trace!(
                start = window.start(),
                end = window.end(),
                "Refresh cycle completed with no changes"
            );
        }
        report
    }

    pub async fn refresh_recommendations(&self) -> RefreshOutcome {
        let outcome = self.recommendations.refresh().await;
        match outcome {
            RefreshOutcome::Written => {
                self.metrics.writes.fetch_add(1, Ordering::Relaxed);
            }
            RefreshOutcome::Skipped => {
                self.metrics.skipped.fetch_add(1, Ordering::Relaxed);
            }
            RefreshOutcome::Failed => {
                self.metrics.failures.fetch_add(1, Ordering::Relaxed);
            }
            RefreshOutcome::Unchanged => {}
        }
        outcome
    }

    /// Drop the day exactly at the retention horizon everywhere it lives.
    pub async fn sweep(&self) -> SweepReport {
        self.metrics.sweeps.fetch_add(1, Ordering::Relaxed);
        let date = self.clock.today() - ChronoDuration::days(i64::from(self.config.retention_days));
        let key = finished_key(date);

        let store_keys = vec![self.keys.data(&key), self.keys.marker(&key)];
        let store_deleted = match self.store.delete(&store_keys).await {
            Ok(count) => count,
            Err(e) => {
                tracing::error!(error = %e, date = %date, "Failed to delete expired day from store");
                self.metrics.failures.fetch_add(1, Ordering::Relaxed);
                0
            }
        };
        let cache_deleted = self.cache.delete(&key);
        self.gate.forget(&key);
        let purged = self.cache.purge_expired();

        tracing::info!(
            date = %date,
            store_deleted,
            cache_deleted,
            purged,
            "Cleanup sweep completed"
        );
        SweepReport {
            date,
            store_deleted,
            cache_deleted,
            purged,
        }
    }

    /// Signal every tier to stop and wait for them.
    pub async fn stop(&self) {
        self.shutdown_tx.send_replace(true);
        let handles: Vec<JoinHandle<()>> = match self.handles.lock() {
            Ok(mut guard) => guard.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Refresh tier ended abnormally");
            }
        }

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            cycles = snapshot.cycles,
            fetches = snapshot.fetches,
            writes = snapshot.writes,
            skipped = snapshot.skipped,
            sweeps = snapshot.sweeps,
            failures = snapshot.failures,
            "Refresh scheduler stopped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use matchday_core::{FixedClock, RECOMMEND_KEY};
    use matchday_test_utils::fixtures::{league_record, match_record, ymd};
    use matchday_test_utils::{CountingStaticFeed, CountingStore};

    struct Harness {
        feed: Arc<CountingStaticFeed>,
        store: Arc<CountingStore>,
        cache: Arc<TieredCache<CachedSet>>,
        gate: Arc<VersionGate>,
        scheduler: Arc<RefreshScheduler>,
    }

    fn harness(today: NaiveDate, config: EngineConfig) -> Harness {
        let feed = Arc::new(CountingStaticFeed::new());
        let store = Arc::new(CountingStore::new());
        let keys = StoreKeys::default();
        let cache = Arc::new(TieredCache::new());
        let gate = Arc::new(VersionGate::new(store.clone(), keys.clone()));
        let fetcher = Arc::new(DayFetcher::new(
            feed.clone(),
            store.clone(),
            keys.clone(),
            Duration::from_secs(5),
        ));
        let recommendations = Arc::new(RecommendationService::new(
            store.clone(),
            keys.clone(),
            cache.clone(),
            gate.clone(),
            Duration::from_secs(5),
        ));
        let scheduler = Arc::new(RefreshScheduler::new(
            fetcher,
            recommendations,
            cache.clone(),
            gate.clone(),
            store.clone(),
            keys,
            Arc::new(FixedClock::new(today)),
            config,
        ));
        Harness {
            feed,
            store,
            cache,
            gate,
            scheduler,
        }
    }

    #[tokio::test]
    async fn test_window_skips_unchanged_days() {
        let today = ymd(2025, 6, 30);
        let h = harness(today, EngineConfig::default());
        for offset in 0..10 {
            let date = today - ChronoDuration::days(offset);
            h.feed.publish(date, vec![match_record(&offset.to_string(), 100, "足球")]);
            h.store.set_marker(&finished_key(date), "1").await;
        }
        for offset in [2, 5, 7] {
            assert!(h.gate.changed(&finished_key(today - ChronoDuration::days(offset))).await);
        }

        let report = h.scheduler.run_window(RefreshWindow::new(0, 10)).await;
        assert_eq!(report.fetched, 7);
        assert_eq!(report.skipped, 3);
        assert_eq!(report.written, 7);
        assert_eq!(h.feed.calls(), 7);
        assert_eq!(h.cache.stats().writes, 7);
    }

    #[tokio::test]
    async fn test_second_cycle_is_gated() {
        let today = ymd(2025, 6, 30);
        let h = harness(today, EngineConfig::default());
        h.feed.publish(today, vec![match_record("1", 100, "足球")]);

        let first = h.scheduler.run_window(RefreshWindow::new(0, 3)).await;
        let second = h.scheduler.run_window(RefreshWindow::new(0, 3)).await;
        assert_eq!(first.fetched, 3);
        assert_eq!(second.fetched, 0);
        assert_eq!(second.skipped, 3);

        h.store.set_marker(&finished_key(today), "2").await;
        let third = h.scheduler.run_window(RefreshWindow::new(0, 3)).await;
        assert_eq!(third.fetched, 1);
        assert_eq!(third.written, 0);
    }

    #[tokio::test]
    async fn test_degraded_day_retried_next_cycle() {
        let today = ymd(2025, 6, 30);
        let h = harness(today, EngineConfig::default());
        h.feed.publish(today, vec![match_record("1", 100, "足球")]);
        h.scheduler.run_window(RefreshWindow::new(0, 1)).await;

        h.feed.fail_on(today);
        h.store.set_marker(&finished_key(today), "2").await;
        let report = h.scheduler.run_window(RefreshWindow::new(0, 1)).await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.written, 0);

        h.feed.recover(today);
        let report = h.scheduler.run_window(RefreshWindow::new(0, 1)).await;
        assert_eq!(report.fetched, 1);
        assert_eq!(h.scheduler.metrics().failures, 1);
    }

    #[tokio::test]
    async fn test_extended_window_uses_ttl_policy() {
        let today = ymd(2025, 6, 30);
        let h = harness(today, EngineConfig::default());
        let date = today - ChronoDuration::days(20);
        h.feed.publish(date, vec![match_record("1", 100, "足球")]);

        h.scheduler.run_window(EngineConfig::default().extended_window()).await;
        let stats = h.cache.stats();
        let detail = stats
            .keys
            .iter()
            .find(|k| k.key == finished_key(date))
            .unwrap();
        assert!(detail.expires_in_secs.is_some());
    }

    #[tokio::test]
    async fn test_sweep_removes_day_everywhere() {
        let today = ymd(2025, 6, 30);
        let h = harness(today, EngineConfig::default().with_retention_days(180));
        let horizon = today - ChronoDuration::days(180);
        let key = finished_key(horizon);
        h.store
            .publish_day(horizon, &[("3729", vec![league_record("1", 1, "3729")])])
            .await;
        h.store.set_marker(&key, "9").await;
        h.scheduler.run_window(RefreshWindow::new(180, 181)).await;
        assert!(h.cache.contains(&key));
        assert!(h.gate.remembered(&key).is_some());

        let report = h.scheduler.sweep().await;
        assert_eq!(report.date, horizon);
        assert_eq!(report.store_deleted, 2);
        assert!(report.cache_deleted);
        assert!(!h.cache.contains(&key));
        assert!(h.gate.remembered(&key).is_none());
        assert_eq!(
            h.store.deleted_keys(),
            vec!["pgame:finished:2025-01-01".to_string(), "pgame:finished:2025-01-01:code".to_string()]
        );
    }

    #[tokio::test]
    async fn test_sweep_survives_store_failure() {
        let today = ymd(2025, 6, 30);
        let h = harness(today, EngineConfig::default());
        h.store.set_failing(true);
        let report = h.scheduler.sweep().await;
        assert_eq!(report.store_deleted, 0);
        assert_eq!(h.scheduler.metrics().failures, 1);
    }

    #[tokio::test]
    async fn test_warm_up_loads_recent_days_and_recommendations() {
        let today = ymd(2025, 6, 30);
        let h = harness(today, EngineConfig::default());
        h.feed.publish(today, vec![match_record("1", 100, "足球")]);
        let mut groups = BTreeMap::new();
        groups.insert("3729", vec![(today, vec![league_record("2", 1, "3729")])]);
        h.store.publish_recommendations(&groups).await;

        let report = h.scheduler.warm_up().await;
        assert_eq!(report.fetched, 10);
        assert!(h.cache.contains(&finished_key(today)));
        assert!(h.cache.contains(RECOMMEND_KEY));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_once_and_stop_joins_tiers() {
        let today = ymd(2025, 6, 30);
        let config = EngineConfig::default()
            .with_recent_interval(Duration::from_secs(10))
            .with_extended_interval(Duration::from_secs(3600));
        let h = harness(today, config);

        assert!(h.scheduler.start());
        assert!(!h.scheduler.start());
        assert!(h.scheduler.is_running());

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(h.scheduler.metrics().cycles, 2);

        h.scheduler.stop().await;
        assert!(!h.scheduler.is_running());
        let cycles = h.scheduler.metrics().cycles;
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(h.scheduler.metrics().cycles, cycles);
    }
}
