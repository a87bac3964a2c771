// Stats endpoints - leveling/streak snapshot and the activity map

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::engine::{leveling, streak};
use crate::error::EngineError;
use crate::server::AppState;

/// JSON structure returned by /api/users/:user_id/stats
///
/// `next_level_threshold` is derived here from the canonical curve so no
/// client ever recomputes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStatsResponse {
    pub user_id: i64,
    pub current_level: i64,
    pub xp_into_level: i64,
    pub next_level_threshold: i64,
    pub streak_days: i64,
    pub last_processed_day: Option<NaiveDate>,
}

/// GET /api/users/:user_id/stats
pub async fn get_user_stats(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<UserStatsResponse>, EngineError> {
    let user = state
        .store
        .get_user(user_id)?
        .ok_or(EngineError::UnknownUser(user_id))?;

    Ok(Json(UserStatsResponse {
        user_id: user.id,
        current_level: user.current_level,
        xp_into_level: user.xp_into_level,
        next_level_threshold: leveling::next_level_threshold(user.current_level),
        streak_days: user.streak_days,
        last_processed_day: user.last_processed_day,
    }))
}

/// JSON structure returned by /api/users/:user_id/activity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityResponse {
    /// Calendar day -> completion count, ordered by day
    pub days: BTreeMap<NaiveDate, i64>,
}

/// GET /api/users/:user_id/activity - historical completion density
///
/// Always rebuilt from the completion log, so the grid survives anything
/// short of losing the database itself.
pub async fn get_activity(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<ActivityResponse>, EngineError> {
    if state.store.get_user(user_id)?.is_none() {
        return Err(EngineError::UnknownUser(user_id));
    }

    let logs = state.store.all_logs(user_id)?;
    Ok(Json(ActivityResponse {
        days: streak::activity_map(&logs),
    }))
}
