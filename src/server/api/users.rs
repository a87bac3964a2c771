// User endpoints - provisioning and lookup
//
// Registration itself is an upstream concern; this just seeds the stats row
// (level 1, zero XP, zero streak) so the engine has something to mutate.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use crate::error::EngineError;
use crate::models::User;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
}

/// POST /api/users - create a user, or return the existing row for the
/// username (provisioning is idempotent)
pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<User>, EngineError> {
    let user = state.store.create_user(&req.username)?;
    Ok(Json(user))
}

/// GET /api/users/:user_id
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<User>, EngineError> {
    let user = state
        .store
        .get_user(user_id)?
        .ok_or_else(|| EngineError::NotFound(format!("user {}", user_id)))?;
    Ok(Json(user))
}
