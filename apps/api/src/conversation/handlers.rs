use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use crate::conversation::keyboards::Reply;
use crate::conversation::state::Incoming;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub user_id: i64,
    pub input: Incoming,
}

/// POST /api/v1/chat/:conversation_id
pub async fn handle_chat(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<Reply>, AppError> {
    let reply = state
        .dialog
        .handle(&conversation_id, req.user_id, req.input, Utc::now())
        .await?;
    Ok(Json(reply))
}
