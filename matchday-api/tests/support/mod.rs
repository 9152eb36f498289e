#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use matchday_api::{create_router, AppState, Sources};
use matchday_core::{EngineConfig, FixedClock, SearchOracle};
use matchday_storage::StoreKeys;
use matchday_test_utils::{CountingStaticFeed, CountingStore, StubOracle};
use serde_json::Value;
use tower::ServiceExt;

pub const ADMIN_SECRET: &str = "s3cret";

pub struct TestApp {
    pub feed: Arc<CountingStaticFeed>,
    pub store: Arc<CountingStore>,
    pub oracle: Option<Arc<StubOracle>>,
    pub state: AppState,
}

impl TestApp {
    pub fn new(today: NaiveDate) -> Self {
        Self::build(today, EngineConfig::default(), None, Some(ADMIN_SECRET))
    }

    pub fn with_oracle(today: NaiveDate, dates: Vec<NaiveDate>) -> Self {
        let oracle = Arc::new(StubOracle::with_dates(dates));
        Self::build(today, EngineConfig::default(), Some(oracle), Some(ADMIN_SECRET))
    }

    pub fn without_secret(today: NaiveDate) -> Self {
        Self::build(today, EngineConfig::default(), None, None)
    }

    pub fn build(
        today: NaiveDate,
        engine: EngineConfig,
        oracle: Option<Arc<StubOracle>>,
        admin_secret: Option<&str>,
    ) -> Self {
        let feed = Arc::new(CountingStaticFeed::new());
        let store = Arc::new(CountingStore::new());
        let sources = Sources {
            feed: feed.clone(),
            store: store.clone(),
            oracle: oracle.clone().map(|o| o as Arc<dyn SearchOracle>),
        };
        let state = AppState::assemble(
            sources,
            StoreKeys::default(),
            Arc::new(FixedClock::new(today)),
            engine,
            admin_secret.map(str::to_string),
        );
        Self {
            feed,
            store,
            oracle,
            state,
        }
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, String) {
        get(self.router(), uri).await
    }

    pub async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let (status, body) = self.get(uri).await;
        let json = serde_json::from_str(&body).expect("response body is JSON");
        (status, json)
    }
}

pub async fn get(router: Router, uri: &str) -> (StatusCode, String) {
    let (status, _, body) = get_full(router, uri).await;
    (status, body)
}

pub async fn get_full(router: Router, uri: &str) -> (StatusCode, HeaderMap, String) {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("valid request");
    let response = router.oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    (status, headers, String::from_utf8_lossy(&bytes).into_owned())
}
