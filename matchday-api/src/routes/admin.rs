//! Cache administration endpoints.
//!
//! Every call carries the shared secret in the `key` query parameter. With no
//! secret configured the routes answer 403 to everyone.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use matchday_core::parse_date;
use matchday_storage::CacheStats;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::constants::{INVALID_PARAMS_MSG, REFRESH_TYPE_FINISHED, REFRESH_TYPE_RECOMMEND};
use crate::error::{ApiError, ApiResult};
use crate::jobs::SchedulerSnapshot;
use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminParams {
    #[serde(default)]
    pub key: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub date: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub cache: CacheStats,
    pub hit_rate: f64,
    pub scheduler: SchedulerSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshResponse {
    pub success: bool,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl RefreshResponse {
    fn rejected(msg: &str) -> (StatusCode, Json<Self>) {
        (
            StatusCode::BAD_REQUEST,
            Json(Self {
                success: false,
                msg: msg.to_string(),
                date: None,
            }),
        )
    }
}

fn authorize(state: &AppState, key: &str) -> ApiResult<()> {
    match state.admin_secret.as_deref() {
        Some(secret) if !key.is_empty() && secret == key => Ok(()),
        _ => Err(ApiError::forbidden("forbidden")),
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /admin/cache/stats
pub async fn stats(
    State(state): State<AppState>,
    Query(params): Query<AdminParams>,
) -> ApiResult<Json<StatsResponse>> {
    authorize(&state, &params.key)?;
    let cache = state.cache.stats();
    Ok(Json(StatsResponse {
        hit_rate: cache.hit_rate(),
        cache,
        scheduler: state.scheduler.metrics(),
    }))
}

/// GET /admin/cache/refresh?type=recommend|finished&date=
pub async fn refresh(
    State(state): State<AppState>,
    Query(params): Query<AdminParams>,
) -> ApiResult<Response> {
    authorize(&state, &params.key)?;

    let (outcome, date) = match params.kind.as_str() {
        REFRESH_TYPE_RECOMMEND => (state.recommendations.force_refresh().await, None),
        REFRESH_TYPE_FINISHED => {
            let Some(date) = parse_date(params.date.trim()) else {
                return Ok(RefreshResponse::rejected("日期错误").into_response());
            };
            (state.assembler.refresh_day(date).await, Some(params.date.trim().to_string()))
        }
        _ => return Ok(RefreshResponse::rejected(INVALID_PARAMS_MSG).into_response()),
    };

    tracing::info!(kind = %params.kind, date = ?date, outcome = outcome.as_str(), "Manual cache refresh");
    let response = RefreshResponse {
        success: !outcome.is_failure(),
        msg: format!("{} cache refresh {}", params.kind, outcome.as_str()),
        date,
    };
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// GET /admin/cache/data?date=
pub async fn data(
    State(state): State<AppState>,
    Query(params): Query<AdminParams>,
) -> ApiResult<Response> {
    authorize(&state, &params.key)?;

    let Some(date) = parse_date(params.date.trim()) else {
        return Ok((StatusCode::BAD_REQUEST, Json(json!({ "msg": "日期参数错误" }))).into_response());
    };
    match state.assembler.cached_day(date) {
        Some(day) => Ok(Json(day).into_response()),
        None => Ok(Json(json!({ "msg": "缓存不存在", "date": params.date.trim() })).into_response()),
    }
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(stats))
        .route("/refresh", get(refresh))
        .route("/data", get(data))
}
