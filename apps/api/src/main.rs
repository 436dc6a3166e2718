mod config;
mod conversation;
mod db;
mod errors;
mod habits;
mod models;
mod routes;
mod state;
mod timeline;

use anyhow::Result;
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::Config;
use crate::conversation::store::{MemorySessionStore, RedisSessionStore, SessionStore};
use crate::db::create_pool;
use crate::routes::build_router;
use crate::state::AppState;
use crate::timeline::{MemoryTimelineStore, PgTimelineStore, TimelineStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Habits API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize the timeline store: PostgreSQL (runs migrations) or in-process
    let timeline: Arc<dyn TimelineStore> = match &config.database_url {
        Some(url) => {
            let db = create_pool(url, config.db_max_connections).await?;
            Arc::new(PgTimelineStore::new(db))
        }
        None => {
            warn!("DATABASE_URL not set; habits are kept in process memory and lost on restart");
            Arc::new(MemoryTimelineStore::new())
        }
    };

    // Conversation sessions: Redis when configured, in-process otherwise
    let sessions: Arc<dyn SessionStore> = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            let store = RedisSessionStore::connect(&client, config.session_ttl_secs).await?;
            info!("Redis session store initialized");
            Arc::new(store)
        }
        None => {
            warn!("REDIS_URL not set; conversation sessions are kept in process memory");
            Arc::new(MemorySessionStore::new(config.session_ttl_secs))
        }
    };

    let habit_config = config.habit_config();
    info!(
        "Habit quota: {} active habits per user",
        habit_config.max_habits_per_user
    );

    // Build app state
    let state = AppState::new(timeline, sessions, habit_config);

    // Build router
    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
