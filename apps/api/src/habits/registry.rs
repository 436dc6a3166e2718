use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::HabitConfig;
use crate::errors::AppError;
use crate::habits::validation::validate_habit_name;
use crate::models::habit::{Habit, Period};
use crate::timeline::TimelineStore;

/// Habit lifecycle: creation under the per-user quota, listing, soft deactivation.
#[derive(Clone)]
pub struct HabitRegistry {
    store: Arc<dyn TimelineStore>,
    config: HabitConfig,
}

impl HabitRegistry {
    pub fn new(store: Arc<dyn TimelineStore>, config: HabitConfig) -> Self {
        Self { store, config }
    }

    /// Creates the habit together with its first open period, starting at `now`.
    ///
    /// The user row is created on first use and stays locked for the rest of
    /// the transaction, so the quota check and insert cannot interleave with
    /// another create for the same user.
    pub async fn create_habit(
        &self,
        user_id: i64,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<Habit, AppError> {
        let name = validate_habit_name(name)?;
        let limit = self.config.max_habits_per_user;

        let mut tx = self.store.begin().await?;
        tx.ensure_user(user_id, now).await?;

        let active = tx.count_active_habits(user_id).await?;
        if active >= u64::from(limit) {
            warn!("User {user_id} is at the active habit limit ({active}/{limit})");
            return Err(AppError::QuotaExceeded { limit });
        }

        let habit = Habit {
            id: Uuid::new_v4(),
            user_id,
            name,
            is_active: true,
            created_at: now,
        };
        tx.insert_habit(&habit).await?;
        tx.insert_period(&Period::open(habit.id, now)).await?;
        tx.commit().await?;

        info!("Created habit {} '{}' for user {user_id}", habit.id, habit.name);
        Ok(habit)
    }

    pub async fn list_active_habits(&self, user_id: i64) -> Result<Vec<Habit>, AppError> {
        Ok(self.store.active_habits(user_id).await?)
    }

    pub async fn get_habit(&self, habit_id: Uuid) -> Result<Habit, AppError> {
        self.store
            .habit(habit_id)
            .await?
            .ok_or_else(|| AppError::habit_not_found(habit_id))
    }

    /// Soft delete. Periods and setbacks stay in place; deactivating an
    /// inactive habit is a no-op.
    pub async fn deactivate_habit(&self, habit_id: Uuid) -> Result<(), AppError> {
        let mut tx = self.store.begin().await?;
        let habit = tx
            .find_habit(habit_id)
            .await?
            .ok_or_else(|| AppError::habit_not_found(habit_id))?;

        if !habit.is_active {
            return Ok(());
        }

        tx.set_habit_active(habit_id, false).await?;
        tx.commit().await?;

        info!("Deactivated habit {habit_id} for user {}", habit.user_id);
        Ok(())
    }
}
