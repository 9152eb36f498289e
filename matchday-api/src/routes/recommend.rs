//! Recommendation list endpoint.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use matchday_core::{CategoryFilter, DayGroup};
use serde::{Deserialize, Serialize};

use crate::constants::OK_MSG;
use crate::services::RecommendationService;
use crate::state::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecommendParams {
    #[serde(default)]
    pub pgame_league_ids: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendResponse {
    pub status: u8,
    pub msg: String,
    pub list: Vec<DayGroup>,
}

/// GET /pgame_recommend/list
pub async fn list(
    State(service): State<Arc<RecommendationService>>,
    Query(params): Query<RecommendParams>,
) -> Json<RecommendResponse> {
    let filter = CategoryFilter::from_ids(&params.pgame_league_ids);
    Json(RecommendResponse {
        status: 1,
        msg: OK_MSG.to_string(),
        list: service.list(&filter).await,
    })
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/list", get(list))
}
