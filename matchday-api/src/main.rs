//! Matchday API Server Entry Point
//!
//! Loads configuration, connects the sources, warms the cache and serves
//! the read API until interrupted.

use std::sync::Arc;

use matchday_api::telemetry::{init_tracing, TelemetryConfig};
use matchday_api::{connect, create_router, ApiError, ApiResult, AppConfig, AppState};
use matchday_core::SystemClock;
use matchday_storage::StoreKeys;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let config = AppConfig::from_env()?;

    init_tracing(&TelemetryConfig::from_app_config(&config))?;

    let clock = Arc::new(SystemClock::with_offset_hours(config.utc_offset_hours)?);
    let sources = connect(&config).await?;
    let state = AppState::assemble(
        sources,
        StoreKeys::new(config.store_namespace.clone()),
        clock,
        config.engine.clone(),
        config.admin_secret.clone(),
    );

    let report = state.scheduler.warm_up().await;
    tracing::info!(
        fetched = report.fetched,
        written = report.written,
        failed = report.failed,
        "Cache warmed"
    );
    state.scheduler.start();

    let scheduler = state.scheduler.clone();
    let cache = state.cache.clone();
    let app = create_router(state);

    let addr = config.bind_addr()?;
    tracing::info!(%addr, "Starting Matchday API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    scheduler.stop().await;
    cache.shutdown();
    Ok(())
}
