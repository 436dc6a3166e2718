use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Habit {
    pub id: Uuid,
    pub user_id: i64,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A contiguous segment of a habit's timeline. `end_at == None` marks the
/// open period, i.e. the current streak.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Period {
    pub id: Uuid,
    pub habit_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
}

impl Period {
    pub fn open(habit_id: Uuid, start_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            habit_id,
            start_at,
            end_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_at.is_none()
    }

    /// Whole seconds between start and `until`, floored and clamped at zero.
    pub fn elapsed_secs(&self, until: DateTime<Utc>) -> u64 {
        let secs = (until - self.start_at).num_seconds();
        u64::try_from(secs).unwrap_or(0)
    }
}

/// The setback ("relapse") that closed a period. Stored in `relapses`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SetbackRecord {
    pub id: Uuid,
    pub period_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub reason: Option<String>,
}
