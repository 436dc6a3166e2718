use std::str::FromStr;

use anyhow::{bail, Context, Result};

pub const DEFAULT_MAX_HABITS_PER_USER: u32 = 3;
const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 3600;

/// Application configuration loaded from environment variables.
/// Startup fails if a variable is present but malformed.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL when set; an in-process timeline otherwise (local runs only).
    pub database_url: Option<String>,
    /// Conversation sessions live in Redis when set, in process otherwise.
    pub redis_url: Option<String>,
    pub max_habits_per_user: u32,
    pub session_ttl_secs: u64,
    pub db_max_connections: u32,
    pub port: u16,
    pub rust_log: String,
}

/// Settings the Habit Registry is constructed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HabitConfig {
    pub max_habits_per_user: u32,
}

impl Default for HabitConfig {
    fn default() -> Self {
        Self {
            max_habits_per_user: DEFAULT_MAX_HABITS_PER_USER,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let max_habits_per_user = parse_or(
            "MAX_HABITS_PER_USER",
            optional_env("MAX_HABITS_PER_USER"),
            DEFAULT_MAX_HABITS_PER_USER,
        )?;
        if max_habits_per_user == 0 {
            bail!("MAX_HABITS_PER_USER must be at least 1");
        }

        Ok(Config {
            database_url: optional_env("DATABASE_URL"),
            redis_url: optional_env("REDIS_URL"),
            max_habits_per_user,
            session_ttl_secs: parse_or(
                "SESSION_TTL_SECS",
                optional_env("SESSION_TTL_SECS"),
                DEFAULT_SESSION_TTL_SECS,
            )?,
            db_max_connections: parse_or(
                "DB_MAX_CONNECTIONS",
                optional_env("DB_MAX_CONNECTIONS"),
                10,
            )?,
            port: parse_or("PORT", optional_env("PORT"), 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn habit_config(&self) -> HabitConfig {
        HabitConfig {
            max_habits_per_user: self.max_habits_per_user,
        }
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{value}'")),
        None => Ok(default),
    }
}
