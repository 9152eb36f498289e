//! Match record list endpoints (JSON or JSONP).

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use matchday_core::{format_date, parse_date, CategoryFilter, InterestFilter, MatchRecord};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DATE_PLACEHOLDER, INVALID_DATE_MSG, INVALID_PARAMS_MSG, JSONP_CONTENT_TYPE, MAX_CALLBACK_LEN,
    NO_DATA_MSG,
};
use crate::error::ApiError;
use crate::services::{MatchList, MatchListAssembler};
use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub next_date: String,
    /// Interest codes, e.g. `1,2,41`.
    #[serde(default)]
    pub usersports: String,
    #[serde(default)]
    pub pgame_league_ids: String,
    #[serde(default)]
    pub callback: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchRecordResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    pub date: String,
    pub date_str: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_data: Option<u8>,
    pub next_date: String,
    pub list: Vec<MatchRecord>,
}

impl MatchRecordResponse {
    fn from_list(list: MatchList) -> Self {
        match list {
            MatchList::Found { set, next_date } => Self {
                msg: None,
                date: format_date(set.date),
                date_str: set.label,
                no_data: None,
                next_date: format_date(next_date),
                list: set.items,
            },
            MatchList::Empty => Self::no_data(NO_DATA_MSG),
        }
    }

    fn no_data(msg: &str) -> Self {
        Self {
            msg: Some(msg.to_string()),
            date: String::new(),
            date_str: String::new(),
            no_data: Some(1),
            next_date: String::new(),
            list: Vec::new(),
        }
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Requested day: empty or placeholder means today.
pub fn resolve_date(raw: &str, today: NaiveDate) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() || raw == DATE_PLACEHOLDER {
        return Some(today);
    }
    parse_date(raw)
}

/// JSONP callback names are limited to identifier-ish characters.
pub fn valid_callback(callback: &str) -> bool {
    !callback.is_empty()
        && callback.len() <= MAX_CALLBACK_LEN
        && callback
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$'))
}

/// Serialize `body` as JSON, or as `callback(<json>);` when a callback is given.
pub fn respond<T: Serialize>(status: StatusCode, callback: Option<&str>, body: &T) -> Response {
    match callback {
        Some(callback) => match serde_json::to_string(body) {
            Ok(json) => (
                status,
                [(header::CONTENT_TYPE, JSONP_CONTENT_TYPE)],
                format!("{}({});", callback, json),
            )
                .into_response(),
            Err(e) => ApiError::from(e).into_response(),
        },
        None => (status, Json(body)).into_response(),
    }
}

#[derive(Debug, Clone, Copy)]
enum Lookup {
    Cache,
    Oracle,
}

async fn answer(assembler: &MatchListAssembler, params: ListParams, lookup: Lookup) -> Response {
    let callback = match params.callback.trim() {
        "" => None,
        cb if valid_callback(cb) => Some(cb),
        _ => {
            return respond(
                StatusCode::BAD_REQUEST,
                None,
                &MatchRecordResponse::no_data(INVALID_PARAMS_MSG),
            )
        }
    };

    let Some(requested) = resolve_date(&params.next_date, assembler.today()) else {
        return respond(
            StatusCode::BAD_REQUEST,
            callback,
            &MatchRecordResponse::no_data(INVALID_DATE_MSG),
        );
    };

    let interests = InterestFilter::from_codes(&params.usersports);
    let categories = CategoryFilter::from_ids(&params.pgame_league_ids);
    let list = match lookup {
        Lookup::Cache => assembler.list(requested, &interests, &categories).await,
        Lookup::Oracle => {
            assembler
                .list_via_oracle(requested, &interests, &categories)
                .await
        }
    };

    respond(StatusCode::OK, callback, &MatchRecordResponse::from_list(list))
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /match_record/list
pub async fn list(
    State(assembler): State<Arc<MatchListAssembler>>,
    Query(params): Query<ListParams>,
) -> Response {
    answer(&assembler, params, Lookup::Cache).await
}

/// GET /match_record/search_list
pub async fn search_list(
    State(assembler): State<Arc<MatchListAssembler>>,
    Query(params): Query<ListParams>,
) -> Response {
    if !assembler.oracle_enabled() {
        return ApiError::not_found("search index is not configured").into_response();
    }
    answer(&assembler, params, Lookup::Oracle).await
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/list", get(list))
        .route("/search_list", get(search_list))
}
