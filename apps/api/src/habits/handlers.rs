use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::habits::engine::HabitStats;
use crate::models::habit::{Habit, SetbackRecord};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateHabitRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LogSetbackRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// POST /api/v1/users/:user_id/habits
pub async fn handle_create_habit(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(req): Json<CreateHabitRequest>,
) -> Result<(StatusCode, Json<Habit>), AppError> {
    let habit = state
        .registry
        .create_habit(user_id, &req.name, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(habit)))
}

/// GET /api/v1/users/:user_id/habits
pub async fn handle_list_habits(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<Habit>>, AppError> {
    Ok(Json(state.registry.list_active_habits(user_id).await?))
}

/// GET /api/v1/habits/:id
pub async fn handle_get_habit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Habit>, AppError> {
    Ok(Json(state.registry.get_habit(id).await?))
}

/// DELETE /api/v1/habits/:id
pub async fn handle_deactivate_habit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.registry.deactivate_habit(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/habits/:id/setbacks
pub async fn handle_log_setback(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<LogSetbackRequest>,
) -> Result<(StatusCode, Json<SetbackRecord>), AppError> {
    let record = state
        .engine
        .log_setback(id, req.reason.as_deref(), Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/v1/habits/:id/setbacks
pub async fn handle_list_setbacks(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<SetbackRecord>>, AppError> {
    Ok(Json(state.engine.list_setbacks(id).await?))
}

/// GET /api/v1/habits/:id/stats
pub async fn handle_get_stats(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<HabitStats>, AppError> {
    Ok(Json(state.engine.get_stats(id, Utc::now()).await?))
}
