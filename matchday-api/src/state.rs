//! Shared application state for Axum routers.

use std::sync::Arc;

use matchday_core::{Clock, EngineConfig, StructuredStore};
use matchday_storage::{CachedSet, StoreKeys, TieredCache, VersionGate};

use crate::jobs::RefreshScheduler;
use crate::services::{DayFetcher, MatchListAssembler, RecommendationService};
use crate::sources::Sources;

/// Cache type shared by every engine part.
pub type EngineCache = TieredCache<CachedSet>;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub assembler: Arc<MatchListAssembler>,
    pub recommendations: Arc<RecommendationService>,
    pub scheduler: Arc<RefreshScheduler>,
    pub cache: Arc<EngineCache>,
    pub store: Arc<dyn StructuredStore>,
    /// Shared secret of the admin routes; `None` rejects every admin call.
    pub admin_secret: Option<Arc<str>>,
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Wire the engine: one cache and one version gate shared by the
    /// assembler, the recommendation service and the scheduler.
    pub fn assemble(
        sources: Sources,
        keys: StoreKeys,
        clock: Arc<dyn Clock>,
        engine: EngineConfig,
        admin_secret: Option<String>,
    ) -> Self {
        let cache = Arc::new(EngineCache::new());
        let gate = Arc::new(VersionGate::new(sources.store.clone(), keys.clone()));
        let fetcher = Arc::new(DayFetcher::new(
            sources.feed.clone(),
            sources.store.clone(),
            keys.clone(),
            engine.fetch_timeout,
        ));
        let recommendations = Arc::new(RecommendationService::new(
            sources.store.clone(),
            keys.clone(),
            cache.clone(),
            gate.clone(),
            engine.fetch_timeout,
        ));

        let mut assembler = MatchListAssembler::new(
            fetcher.clone(),
            cache.clone(),
            gate.clone(),
            clock.clone(),
            engine.clone(),
        );
        if let Some(oracle) = sources.oracle.clone() {
            assembler = assembler.with_oracle(oracle);
        }

        let scheduler = Arc::new(RefreshScheduler::new(
            fetcher,
            recommendations.clone(),
            cache.clone(),
            gate,
            sources.store.clone(),
            keys,
            clock,
            engine,
        ));

        Self {
            assembler: Arc::new(assembler),
            recommendations,
            scheduler,
            cache,
            store: sources.store,
            admin_secret: admin_secret.map(Arc::from),
            start_time: std::time::Instant::now(),
        }
    }
}

crate::impl_from_ref!(Arc<MatchListAssembler>, assembler);
crate::impl_from_ref!(Arc<RecommendationService>, recommendations);
crate::impl_from_ref!(Arc<RefreshScheduler>, scheduler);
crate::impl_from_ref!(Arc<EngineCache>, cache);
crate::impl_from_ref!(Arc<dyn StructuredStore>, store);
crate::impl_from_ref!(std::time::Instant, start_time);
