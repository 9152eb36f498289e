//! REST API Routes Module
//!
//! - Match record list, cache-backed and search-index backed (JSON/JSONP)
//! - Recommendation list
//! - Cache administration behind a shared secret
//! - Health check endpoints

pub mod admin;
pub mod health;
pub mod match_record;
pub mod recommend;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub use admin::create_router as admin_router;
pub use health::create_router as health_router;
pub use match_record::create_router as match_record_router;
pub use recommend::create_router as recommend_router;

/// Build the complete application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/match_record", match_record_router())
        .nest("/pgame_recommend", recommend_router())
        .nest("/admin/cache", admin_router())
        .nest("/health", health_router())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new()),
        )
}
