use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{StoreError, TimelineStore, TimelineTx};
use crate::models::habit::{Habit, Period, SetbackRecord};

#[derive(Debug, Clone, Default)]
struct Tables {
    /// User id to first-seen time.
    users: BTreeMap<i64, DateTime<Utc>>,
    habits: Vec<Habit>,
    periods: Vec<Period>,
    setbacks: Vec<SetbackRecord>,
}

impl Tables {
    fn open_periods(&self, habit_id: Uuid) -> impl Iterator<Item = &Period> {
        self.periods
            .iter()
            .filter(move |p| p.habit_id == habit_id && p.is_open())
    }
}

/// In-process timeline with the same constraints as the SQL schema.
///
/// A transaction holds the table lock for its whole lifetime and writes to a
/// staged copy, which replaces the committed tables on `commit`. Writers are
/// serialized and readers never see a half-applied transition.
#[derive(Clone, Default)]
pub struct MemoryTimelineStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryTimelineStore {
    pub fn new() -> Self {
        Self::default()
    }
}

struct MemoryTimelineTx {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
}

#[async_trait]
impl TimelineTx for MemoryTimelineTx {
    async fn ensure_user(&mut self, user_id: i64, now: DateTime<Utc>) -> Result<(), StoreError> {
        self.staged.users.entry(user_id).or_insert(now);
        Ok(())
    }

    async fn count_active_habits(&mut self, user_id: i64) -> Result<u64, StoreError> {
        let count = self
            .staged
            .habits
            .iter()
            .filter(|h| h.user_id == user_id && h.is_active)
            .count();
        Ok(count as u64)
    }

    async fn insert_habit(&mut self, habit: &Habit) -> Result<(), StoreError> {
        if !self.staged.users.contains_key(&habit.user_id) {
            return Err(StoreError::Integrity(format!(
                "user {} does not exist",
                habit.user_id
            )));
        }
        if self.staged.habits.iter().any(|h| h.id == habit.id) {
            return Err(StoreError::Integrity(format!(
                "habit {} already exists",
                habit.id
            )));
        }
        self.staged.habits.push(habit.clone());
        Ok(())
    }

    async fn find_habit(&mut self, habit_id: Uuid) -> Result<Option<Habit>, StoreError> {
        Ok(self.staged.habits.iter().find(|h| h.id == habit_id).cloned())
    }

    async fn set_habit_active(&mut self, habit_id: Uuid, active: bool) -> Result<(), StoreError> {
        if let Some(habit) = self.staged.habits.iter_mut().find(|h| h.id == habit_id) {
            habit.is_active = active;
        }
        Ok(())
    }

    async fn insert_period(&mut self, period: &Period) -> Result<(), StoreError> {
        if !self.staged.habits.iter().any(|h| h.id == period.habit_id) {
            return Err(StoreError::Integrity(format!(
                "habit {} does not exist",
                period.habit_id
            )));
        }
        if period.is_open() && self.staged.open_periods(period.habit_id).next().is_some() {
            return Err(StoreError::Integrity(format!(
                "habit {} already has an open period",
                period.habit_id
            )));
        }
        self.staged.periods.push(period.clone());
        Ok(())
    }

    async fn open_period(&mut self, habit_id: Uuid) -> Result<Option<Period>, StoreError> {
        let mut open = self.staged.open_periods(habit_id);
        let first = open.next().cloned();
        if open.next().is_some() {
            return Err(StoreError::Integrity(format!(
                "habit {habit_id} has more than one open period"
            )));
        }
        Ok(first)
    }

    async fn close_period(
        &mut self,
        period_id: Uuid,
        end_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let period = self
            .staged
            .periods
            .iter_mut()
            .find(|p| p.id == period_id && p.is_open())
            .ok_or_else(|| StoreError::Integrity(format!("period {period_id} is not open")))?;

        if end_at < period.start_at {
            return Err(StoreError::Integrity(format!(
                "period {period_id} would end before it starts"
            )));
        }
        period.end_at = Some(end_at);
        Ok(())
    }

    async fn insert_setback(&mut self, record: &SetbackRecord) -> Result<(), StoreError> {
        if !self.staged.periods.iter().any(|p| p.id == record.period_id) {
            return Err(StoreError::Integrity(format!(
                "period {} does not exist",
                record.period_id
            )));
        }
        if self
            .staged
            .setbacks
            .iter()
            .any(|s| s.period_id == record.period_id)
        {
            return Err(StoreError::Integrity(format!(
                "period {} already has a setback",
                record.period_id
            )));
        }
        self.staged.setbacks.push(record.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTimelineTx { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}

#[async_trait]
impl TimelineStore for MemoryTimelineStore {
    async fn begin(&self) -> Result<Box<dyn TimelineTx>, StoreError> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTimelineTx { guard, staged }))
    }

    async fn active_habits(&self, user_id: i64) -> Result<Vec<Habit>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .habits
            .iter()
            .filter(|h| h.user_id == user_id && h.is_active)
            .cloned()
            .collect())
    }

    async fn habit(&self, habit_id: Uuid) -> Result<Option<Habit>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.habits.iter().find(|h| h.id == habit_id).cloned())
    }

    async fn periods(&self, habit_id: Uuid) -> Result<Vec<Period>, StoreError> {
        let tables = self.tables.lock().await;
        let mut periods: Vec<Period> = tables
            .periods
            .iter()
            .filter(|p| p.habit_id == habit_id)
            .cloned()
            .collect();
        // A zero-length closed period shares its start with the open one after it.
        periods.sort_by_key(|p| (p.start_at, p.is_open()));
        Ok(periods)
    }

    async fn setbacks(&self, habit_id: Uuid) -> Result<Vec<SetbackRecord>, StoreError> {
        let tables = self.tables.lock().await;
        let mut records: Vec<SetbackRecord> = tables
            .setbacks
            .iter()
            .filter(|s| {
                tables
                    .periods
                    .iter()
                    .any(|p| p.id == s.period_id && p.habit_id == habit_id)
            })
            .cloned()
            .collect();
        records.sort_by_key(|s| s.occurred_at);
        Ok(records)
    }
}
