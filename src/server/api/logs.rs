// Completion log endpoint - most-recent-first entries for the streak grid

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::models::LogEntry;
use crate::server::AppState;

/// Query parameters for /api/task-logs
#[derive(Debug, Deserialize)]
pub struct ListLogsQuery {
    pub user_id: i64,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct LogListResponse {
    pub logs: Vec<LogEntry>,
    pub count: usize,
}

/// GET /api/task-logs?user_id=&limit=&offset=
///
/// Entries are immutable snapshots; clients rebuild the activity map from
/// them (or use /api/users/:user_id/activity for the aggregated form).
pub async fn list_task_logs(
    State(state): State<AppState>,
    Query(params): Query<ListLogsQuery>,
) -> Result<Json<LogListResponse>, EngineError> {
    let limit = params.limit.unwrap_or(100).clamp(1, 1000);
    let offset = params.offset.unwrap_or(0).max(0);

    let logs = state.store.list_logs(params.user_id, limit, offset)?;
    let count = logs.len();
    Ok(Json(LogListResponse { logs, count }))
}
