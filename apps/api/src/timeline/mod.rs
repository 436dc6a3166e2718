//! Timeline Store: persisted, append-only periods and setback records per habit.
//!
//! Writers go through a unit of work: `TimelineStore::begin()` hands out a
//! `TimelineTx`, and nothing it wrote is visible to anyone else until
//! `commit()`. Dropping a transaction without committing rolls it back.
//!
//! Backends:
//! - `PgTimelineStore`: PostgreSQL via sqlx (production).
//! - `MemoryTimelineStore`: in-process, same constraints (tests, local runs).
//!
//! `AppState` carries the store as `Arc<dyn TimelineStore>`.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::habit::{Habit, Period, SetbackRecord};

pub use memory::MemoryTimelineStore;
pub use postgres::PgTimelineStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A write would break a timeline constraint (dangling reference,
    /// second open period, second setback for a period).
    #[error("Integrity violation: {0}")]
    Integrity(String),
}

/// One atomic unit of work against the timeline.
#[async_trait]
pub trait TimelineTx: Send {
    /// Inserts the user row if absent and holds it locked until the
    /// transaction ends, serializing quota checks for that user.
    async fn ensure_user(&mut self, user_id: i64, now: DateTime<Utc>) -> Result<(), StoreError>;

    async fn count_active_habits(&mut self, user_id: i64) -> Result<u64, StoreError>;

    async fn insert_habit(&mut self, habit: &Habit) -> Result<(), StoreError>;

    /// Locks and returns the habit row.
    async fn find_habit(&mut self, habit_id: Uuid) -> Result<Option<Habit>, StoreError>;

    async fn set_habit_active(&mut self, habit_id: Uuid, active: bool) -> Result<(), StoreError>;

    async fn insert_period(&mut self, period: &Period) -> Result<(), StoreError>;

    /// Locks and returns the habit's open period, if any.
    async fn open_period(&mut self, habit_id: Uuid) -> Result<Option<Period>, StoreError>;

    async fn close_period(
        &mut self,
        period_id: Uuid,
        end_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn insert_setback(&mut self, record: &SetbackRecord) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// The timeline store. Reads observe only committed state.
#[async_trait]
pub trait TimelineStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn TimelineTx>, StoreError>;

    /// Active habits for a user, in insertion order.
    async fn active_habits(&self, user_id: i64) -> Result<Vec<Habit>, StoreError>;

    async fn habit(&self, habit_id: Uuid) -> Result<Option<Habit>, StoreError>;

    /// Every period of a habit, ordered by start instant.
    async fn periods(&self, habit_id: Uuid) -> Result<Vec<Period>, StoreError>;

    /// Every setback of a habit, ordered by occurrence instant.
    async fn setbacks(&self, habit_id: Uuid) -> Result<Vec<SetbackRecord>, StoreError>;
}
