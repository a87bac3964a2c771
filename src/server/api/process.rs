// Day-processing endpoint - the engine's single write entry point

use axum::{extract::State, Json};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::EngineError;
use crate::models::{CandidateTask, DayReport};
use crate::server::AppState;

/// Request body for /api/process-day
///
/// `day` defaults to today (UTC calendar date) when omitted. Each task
/// carries its completion outcome; the engine only scores.
#[derive(Debug, Deserialize)]
pub struct ProcessDayRequest {
    pub user_id: i64,
    pub day: Option<NaiveDate>,
    pub tasks: Vec<CandidateTask>,
}

/// POST /api/process-day
///
/// Reprocessing an already-processed day is a normal 200 response whose
/// report shows zero XP and `already_logged` outcomes - callers must not
/// treat the no-op as an error.
pub async fn process_day(
    State(state): State<AppState>,
    Json(req): Json<ProcessDayRequest>,
) -> Result<Json<DayReport>, EngineError> {
    let report = state.processor.process(req.user_id, req.day, &req.tasks)?;
    Ok(Json(report))
}
