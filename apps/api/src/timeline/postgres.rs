use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{StoreError, TimelineStore, TimelineTx};
use crate::models::habit::{Habit, Period, SetbackRecord};

/// PostgreSQL-backed timeline. Schema lives in `migrations/`.
///
/// TIMESTAMPTZ columns decode straight into `DateTime<Utc>`, so every instant
/// read back is already on the UTC timeline.
#[derive(Clone)]
pub struct PgTimelineStore {
    pool: PgPool,
}

impl PgTimelineStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub struct PgTimelineTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl TimelineTx for PgTimelineTx {
    async fn ensure_user(&mut self, user_id: i64, now: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO users (id, created_at) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING")
            .bind(user_id)
            .bind(now)
            .execute(&mut *self.tx)
            .await?;

        // Row lock: concurrent creates for the same user queue up here until commit.
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn count_active_habits(&mut self, user_id: i64) -> Result<u64, StoreError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM habits WHERE user_id = $1 AND is_active")
                .bind(user_id)
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn insert_habit(&mut self, habit: &Habit) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO habits (id, user_id, name, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(habit.id)
        .bind(habit.user_id)
        .bind(&habit.name)
        .bind(habit.is_active)
        .bind(habit.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn find_habit(&mut self, habit_id: Uuid) -> Result<Option<Habit>, StoreError> {
        Ok(
            sqlx::query_as::<_, Habit>("SELECT * FROM habits WHERE id = $1 FOR UPDATE")
                .bind(habit_id)
                .fetch_optional(&mut *self.tx)
                .await?,
        )
    }

    async fn set_habit_active(&mut self, habit_id: Uuid, active: bool) -> Result<(), StoreError> {
        sqlx::query("UPDATE habits SET is_active = $1 WHERE id = $2")
            .bind(active)
            .bind(habit_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_period(&mut self, period: &Period) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO periods (id, habit_id, start_at, end_at) VALUES ($1, $2, $3, $4)")
            .bind(period.id)
            .bind(period.habit_id)
            .bind(period.start_at)
            .bind(period.end_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn open_period(&mut self, habit_id: Uuid) -> Result<Option<Period>, StoreError> {
        Ok(sqlx::query_as::<_, Period>(
            "SELECT * FROM periods WHERE habit_id = $1 AND end_at IS NULL FOR UPDATE",
        )
        .bind(habit_id)
        .fetch_optional(&mut *self.tx)
        .await?)
    }

    async fn close_period(
        &mut self,
        period_id: Uuid,
        end_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE periods SET end_at = $1 WHERE id = $2 AND end_at IS NULL")
                .bind(end_at)
                .bind(period_id)
                .execute(&mut *self.tx)
                .await?;

        if result.rows_affected() != 1 {
            return Err(StoreError::Integrity(format!(
                "period {period_id} is not open"
            )));
        }
        Ok(())
    }

    async fn insert_setback(&mut self, record: &SetbackRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO relapses (id, period_id, occurred_at, reason) VALUES ($1, $2, $3, $4)",
        )
        .bind(record.id)
        .bind(record.period_id)
        .bind(record.occurred_at)
        .bind(&record.reason)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let PgTimelineTx { tx } = *self;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl TimelineStore for PgTimelineStore {
    async fn begin(&self) -> Result<Box<dyn TimelineTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTimelineTx { tx }))
    }

    async fn active_habits(&self, user_id: i64) -> Result<Vec<Habit>, StoreError> {
        Ok(sqlx::query_as::<_, Habit>(
            "SELECT * FROM habits WHERE user_id = $1 AND is_active ORDER BY created_at, id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn habit(&self, habit_id: Uuid) -> Result<Option<Habit>, StoreError> {
        Ok(sqlx::query_as::<_, Habit>("SELECT * FROM habits WHERE id = $1")
            .bind(habit_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn periods(&self, habit_id: Uuid) -> Result<Vec<Period>, StoreError> {
        Ok(sqlx::query_as::<_, Period>(
            "SELECT * FROM periods WHERE habit_id = $1 ORDER BY start_at ASC, end_at ASC NULLS LAST",
        )
        .bind(habit_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn setbacks(&self, habit_id: Uuid) -> Result<Vec<SetbackRecord>, StoreError> {
        Ok(sqlx::query_as::<_, SetbackRecord>(
            r#"
            SELECT r.id, r.period_id, r.occurred_at, r.reason
            FROM relapses r
            JOIN periods p ON p.id = r.period_id
            WHERE p.habit_id = $1
            ORDER BY r.occurred_at ASC
            "#,
        )
        .bind(habit_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
