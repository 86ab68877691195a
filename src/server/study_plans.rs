use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};

use crate::auth::RequireAuth;
use crate::server::AppState;
use crate::server::dto::{
    CalendarResponse, HistoryParams, StudyPlanHistoryResponse, StudyPlanResponse,
};
use crate::server::response::{ApiError, StoreOptionExt, StoreResultExt};

pub const DEFAULT_HISTORY_LIMIT: i64 = 10;
const MAX_HISTORY_LIMIT: i64 = 100;

pub fn study_plan_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/latest", get(latest))
        .route("/history", get(history))
        .route("/calendar", get(calendar))
        .route("/{id}", get(get_by_id))
}

pub async fn latest(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
) -> Result<Json<StudyPlanResponse>, ApiError> {
    let study_plan = state
        .store
        .latest_study_plan(&auth.user_id)
        .api_err("Failed to fetch study plan")?
        .or_not_found("No study plan found for this user")?;

    Ok(Json(StudyPlanResponse { study_plan }))
}

pub async fn history(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<StudyPlanHistoryResponse>, ApiError> {
    let limit = match params.limit {
        None => DEFAULT_HISTORY_LIMIT,
        Some(n) if n >= 1 => n.min(MAX_HISTORY_LIMIT),
        Some(_) => return Err(ApiError::bad_request("limit must be a positive integer")),
    };

    let study_plans = state
        .store
        .list_study_plans(&auth.user_id, limit)
        .api_err("Failed to fetch study plan history")?;

    Ok(Json(StudyPlanHistoryResponse {
        count: study_plans.len(),
        study_plans,
    }))
}

pub async fn get_by_id(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StudyPlanResponse>, ApiError> {
    let study_plan = state
        .store
        .get_study_plan(&id)
        .api_err("Failed to fetch study plan")?
        .or_not_found("Study plan not found")?;

    if study_plan.user_id != auth.user_id {
        tracing::warn!(plan_id = %id, user_id = %auth.user_id, "Study plan access denied");
        return Err(ApiError::forbidden("Access denied"));
    }

    Ok(Json(StudyPlanResponse { study_plan }))
}

/// Calendar view of the caller's latest plan.
pub async fn calendar(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
) -> Result<Json<CalendarResponse>, ApiError> {
    let plan = state
        .store
        .latest_study_plan(&auth.user_id)
        .api_err("Failed to fetch calendar entries")?
        .or_not_found("No study plan found")?;

    let entries = plan.calendar_entries();

    Ok(Json(CalendarResponse {
        count: entries.len(),
        entries,
        study_plan_id: plan.id,
        saved_at: plan.saved_at,
    }))
}
