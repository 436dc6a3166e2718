use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::conversation::store::SessionError;
use crate::timeline::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Maximum number of active habits reached ({limit})")]
    QuotaExceeded { limit: u32 },

    #[error("Invalid habit name: {0}")]
    InvalidName(String),

    #[error("Invalid setback reason: {0}")]
    InvalidReason(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No active period found for habit {0}")]
    NoActivePeriod(Uuid),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn habit_not_found(habit_id: Uuid) -> Self {
        AppError::NotFound(format!("Habit {habit_id} not found"))
    }

    /// Errors the user can fix by re-entering input.
    pub fn is_input_error(&self) -> bool {
        matches!(self, AppError::InvalidName(_) | AppError::InvalidReason(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::QuotaExceeded { .. } => {
                (StatusCode::CONFLICT, "QUOTA_EXCEEDED", self.to_string())
            }
            AppError::InvalidName(msg) => (StatusCode::BAD_REQUEST, "INVALID_NAME", msg.clone()),
            AppError::InvalidReason(msg) => {
                (StatusCode::BAD_REQUEST, "INVALID_REASON", msg.clone())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::NoActivePeriod(_) => {
                (StatusCode::CONFLICT, "NO_ACTIVE_PERIOD", self.to_string())
            }
            AppError::Store(e) => {
                tracing::error!("Store error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Session(e) => {
                tracing::error!("Session error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "SESSION_ERROR",
                    "A session storage error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_exceeded_maps_to_conflict() {
        let response = AppError::QuotaExceeded { limit: 3 }.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let response = AppError::habit_not_found(Uuid::new_v4()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_integrity_violation_is_redacted_500() {
        let err = AppError::Store(StoreError::Integrity("two open periods".to_string()));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_input_errors_are_flagged() {
        assert!(AppError::InvalidName("empty".to_string()).is_input_error());
        assert!(AppError::InvalidReason("too long".to_string()).is_input_error());
        assert!(!AppError::NoActivePeriod(Uuid::new_v4()).is_input_error());
    }
}
