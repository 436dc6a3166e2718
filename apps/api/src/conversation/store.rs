use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::conversation::state::ConversationState;

const KEY_PREFIX: &str = "habits:session:";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Session codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Pending conversation state keyed by conversation id. Entries expire after
/// the configured TTL so an abandoned prompt does not linger forever.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, conversation_id: &str) -> Result<Option<ConversationState>, SessionError>;

    async fn save(
        &self,
        conversation_id: &str,
        state: &ConversationState,
    ) -> Result<(), SessionError>;

    async fn clear(&self, conversation_id: &str) -> Result<(), SessionError>;
}

/// Redis-backed sessions: one JSON value per conversation, written with `SET EX`.
#[derive(Clone)]
pub struct RedisSessionStore {
    conn: MultiplexedConnection,
    ttl_secs: u64,
}

impl RedisSessionStore {
    pub async fn connect(client: &redis::Client, ttl_secs: u64) -> Result<Self, SessionError> {
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn, ttl_secs })
    }

    fn key(conversation_id: &str) -> String {
        format!("{KEY_PREFIX}{conversation_id}")
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, conversation_id: &str) -> Result<Option<ConversationState>, SessionError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(Self::key(conversation_id)).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn save(
        &self,
        conversation_id: &str,
        state: &ConversationState,
    ) -> Result<(), SessionError> {
        let json = serde_json::to_string(state)?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(Self::key(conversation_id), json, self.ttl_secs)
            .await?;
        Ok(())
    }

    async fn clear(&self, conversation_id: &str) -> Result<(), SessionError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(Self::key(conversation_id)).await?;
        Ok(())
    }
}

/// In-process sessions for single-instance deployments and tests.
#[derive(Clone)]
pub struct MemorySessionStore {
    entries: Arc<RwLock<HashMap<String, (ConversationState, Instant)>>>,
    ttl: Duration,
}

impl MemorySessionStore {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl: Duration::from_secs(ttl_secs),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, conversation_id: &str) -> Result<Option<ConversationState>, SessionError> {
        let mut entries = self.entries.write().await;
        match entries.get(conversation_id) {
            Some((state, expires_at)) if *expires_at > Instant::now() => {
                return Ok(Some(state.clone()))
            }
            Some(_) => {}
            None => return Ok(None),
        }
        entries.remove(conversation_id);
        Ok(None)
    }

    async fn save(
        &self,
        conversation_id: &str,
        state: &ConversationState,
    ) -> Result<(), SessionError> {
        let expires_at = Instant::now() + self.ttl;
        self.entries
            .write()
            .await
            .insert(conversation_id.to_string(), (state.clone(), expires_at));
        Ok(())
    }

    async fn clear(&self, conversation_id: &str) -> Result<(), SessionError> {
        self.entries.write().await.remove(conversation_id);
        Ok(())
    }
}
