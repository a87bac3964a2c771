// Task registry endpoints - CRUD over a user's tasks

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::EngineError;
use crate::models::{Task, TaskKind};
use crate::server::AppState;
use crate::store::TaskUpdate;

/// Query parameters for /api/tasks
#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    pub user_id: i64,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Task list with count, stable insertion order
#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<Task>,
    pub count: usize,
}

/// GET /api/tasks?user_id=&limit=&offset=
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(params): Query<ListTasksQuery>,
) -> Result<Json<TaskListResponse>, EngineError> {
    let limit = params.limit.unwrap_or(100).clamp(1, 1000);
    let offset = params.offset.unwrap_or(0).max(0);

    let tasks = state.store.list_tasks(params.user_id, limit, offset)?;
    let count = tasks.len();
    Ok(Json(TaskListResponse { tasks, count }))
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub user_id: i64,
    pub name: String,
    pub kind: TaskKind,
    pub base_xp: i64,
    #[serde(default)]
    pub required_daily: bool,
}

/// POST /api/tasks
pub async fn create_task(
    State(state): State<AppState>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<Json<Task>, EngineError> {
    let task = state.store.create_task(
        req.user_id,
        &req.name,
        req.kind,
        req.base_xp,
        req.required_daily,
    )?;
    Ok(Json(task))
}

/// PUT /api/tasks/:task_id - edit display fields and XP value.
/// Already-awarded XP in the completion log is never touched.
pub async fn update_task(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
    Json(update): Json<TaskUpdate>,
) -> Result<Json<Task>, EngineError> {
    let task = state.store.update_task(task_id, update)?;
    Ok(Json(task))
}

/// DELETE /api/tasks/:task_id - removes the task from future processing;
/// log history keeps its frozen snapshot
pub async fn delete_task(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
) -> Result<Json<Value>, EngineError> {
    state.store.delete_task(task_id)?;
    Ok(Json(json!({ "deleted": true })))
}
