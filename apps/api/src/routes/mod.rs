pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::conversation::handlers as chat;
use crate::habits::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Habit Registry
        .route(
            "/api/v1/users/:user_id/habits",
            post(handlers::handle_create_habit).get(handlers::handle_list_habits),
        )
        .route(
            "/api/v1/habits/:id",
            get(handlers::handle_get_habit).delete(handlers::handle_deactivate_habit),
        )
        // Streak/Stats Engine
        .route(
            "/api/v1/habits/:id/setbacks",
            post(handlers::handle_log_setback).get(handlers::handle_list_setbacks),
        )
        .route("/api/v1/habits/:id/stats", get(handlers::handle_get_stats))
        // Chat transport
        .route("/api/v1/chat/:conversation_id", post(chat::handle_chat))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::config::HabitConfig;
    use crate::conversation::store::MemorySessionStore;
    use crate::timeline::MemoryTimelineStore;

    fn app() -> Router {
        let state = AppState::new(
            Arc::new(MemoryTimelineStore::new()),
            Arc::new(MemorySessionStore::new(3600)),
            HabitConfig::default(),
        );
        build_router(state)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => request
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_create_list_and_quota() {
        let app = app();
        for i in 1..=3 {
            let (status, body) = send(
                &app,
                Method::POST,
                "/api/v1/users/42/habits",
                Some(json!({ "name": format!("Habit {i}") })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
            assert_eq!(body["is_active"], true);
        }

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/users/42/habits",
            Some(json!({ "name": "X" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "QUOTA_EXCEEDED");

        let (_, list) = send(&app, Method::GET, "/api/v1/users/42/habits", None).await;
        assert_eq!(list.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_setback_and_stats() {
        let app = app();
        let (_, habit) = send(
            &app,
            Method::POST,
            "/api/v1/users/1/habits",
            Some(json!({ "name": "No smoking" })),
        )
        .await;
        let id = habit["id"].as_str().unwrap().to_string();

        let (status, record) = send(
            &app,
            Method::POST,
            &format!("/api/v1/habits/{id}/setbacks"),
            Some(json!({ "reason": "trigger A" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(record["reason"], "trigger A");

        let (status, stats) = send(&app, Method::GET, &format!("/api/v1/habits/{id}/stats"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["total_setbacks"], 1);
        assert!(stats["current_streak"]["days"].is_u64());

        let (_, history) =
            send(&app, Method::GET, &format!("/api/v1/habits/{id}/setbacks"), None).await;
        assert_eq!(history.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_setback_without_body_reason() {
        let app = app();
        let (_, habit) = send(
            &app,
            Method::POST,
            "/api/v1/users/2/habits",
            Some(json!({ "name": "Coffee" })),
        )
        .await;
        let id = habit["id"].as_str().unwrap().to_string();

        let (status, record) = send(
            &app,
            Method::POST,
            &format!("/api/v1/habits/{id}/setbacks"),
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(record["reason"].is_null());
    }

    #[tokio::test]
    async fn test_deactivate_unknown_habit_is_404() {
        let (status, body) = send(
            &app(),
            Method::DELETE,
            &format!("/api/v1/habits/{}", Uuid::new_v4()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_deactivate_hides_habit_from_listing() {
        let app = app();
        let (_, habit) = send(
            &app,
            Method::POST,
            "/api/v1/users/3/habits",
            Some(json!({ "name": "Sugar" })),
        )
        .await;
        let id = habit["id"].as_str().unwrap().to_string();

        let (status, _) = send(&app, Method::DELETE, &format!("/api/v1/habits/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, list) = send(&app, Method::GET, "/api/v1/users/3/habits", None).await;
        assert!(list.as_array().unwrap().is_empty());

        let (status, fetched) = send(&app, Method::GET, &format!("/api/v1/habits/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["is_active"], false);
    }

    #[tokio::test]
    async fn test_invalid_name_is_400() {
        let (status, body) = send(
            &app(),
            Method::POST,
            "/api/v1/users/4/habits",
            Some(json!({ "name": "   " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_NAME");
    }

    #[tokio::test]
    async fn test_chat_turn() {
        let app = app();
        let (status, reply) = send(
            &app,
            Method::POST,
            "/api/v1/chat/conv-9",
            Some(json!({
                "user_id": 9,
                "input": { "type": "message", "text": "/start" }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["keyboard"]["kind"], "reply");
        assert!(reply["text"].as_str().unwrap().contains("Welcome"));
    }
}
