//! Streak/Stats Engine: closes and reopens periods on a setback and derives
//! the three published statistics from a habit's timeline.
//!
//! Stats:
//! - `total_setbacks`  = number of closed periods (the open period never counts)
//! - `average_period`  = floor mean of closed period lengths, whole seconds
//! - `current_streak`  = `now - start` of the open period
//!
//! Every duration is whole seconds: sub-second precision is dropped per period
//! before summing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::habits::progress::{to_breakdown, TimeProgress};
use crate::habits::validation::normalize_reason;
use crate::models::habit::{Period, SetbackRecord};
use crate::timeline::TimelineStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitStats {
    pub total_setbacks: u64,
    pub average_period: TimeProgress,
    pub current_streak: TimeProgress,
}

#[derive(Clone)]
pub struct StreakEngine {
    store: Arc<dyn TimelineStore>,
}

impl StreakEngine {
    pub fn new(store: Arc<dyn TimelineStore>) -> Self {
        Self { store }
    }

    /// Ends the open period at `now`, records the setback against it and
    /// opens the next period at the same instant. All three writes commit
    /// together or not at all.
    pub async fn log_setback(
        &self,
        habit_id: Uuid,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<SetbackRecord, AppError> {
        let reason = normalize_reason(reason)?;

        let mut tx = self.store.begin().await?;
        let habit = tx
            .find_habit(habit_id)
            .await?
            .filter(|h| h.is_active)
            .ok_or_else(|| AppError::habit_not_found(habit_id))?;

        let Some(open) = tx.open_period(habit_id).await? else {
            warn!("Habit {habit_id} has no open period; refusing to log setback");
            return Err(AppError::NoActivePeriod(habit_id));
        };

        // A clock behind the period start would end the period before it began.
        let at = now.max(open.start_at);

        tx.close_period(open.id, at).await?;
        let record = SetbackRecord {
            id: Uuid::new_v4(),
            period_id: open.id,
            occurred_at: at,
            reason,
        };
        tx.insert_setback(&record).await?;
        tx.insert_period(&Period::open(habit_id, at)).await?;
        tx.commit().await?;

        info!(
            "Logged setback {} for habit {habit_id} (user {})",
            record.id, habit.user_id
        );
        Ok(record)
    }

    /// Stats stay readable after deactivation.
    pub async fn get_stats(&self, habit_id: Uuid, now: DateTime<Utc>) -> Result<HabitStats, AppError> {
        self.ensure_exists(habit_id).await?;
        let periods = self.store.periods(habit_id).await?;
        Ok(compute_stats(&periods, now))
    }

    /// Setback history, oldest first.
    pub async fn list_setbacks(&self, habit_id: Uuid) -> Result<Vec<SetbackRecord>, AppError> {
        self.ensure_exists(habit_id).await?;
        Ok(self.store.setbacks(habit_id).await?)
    }

    async fn ensure_exists(&self, habit_id: Uuid) -> Result<(), AppError> {
        match self.store.habit(habit_id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::habit_not_found(habit_id)),
        }
    }
}

/// Pure stats over a habit's periods.
pub fn compute_stats(periods: &[Period], now: DateTime<Utc>) -> HabitStats {
    let closed: Vec<u64> = periods
        .iter()
        .filter_map(|p| p.end_at.map(|end| p.elapsed_secs(end)))
        .collect();

    let total_setbacks = closed.len() as u64;
    let average_secs = if closed.is_empty() {
        0
    } else {
        closed.iter().sum::<u64>() / total_setbacks
    };

    let current_secs = periods
        .iter()
        .find(|p| p.is_open())
        .map(|p| p.elapsed_secs(now))
        .unwrap_or(0);

    HabitStats {
        total_setbacks,
        average_period: to_breakdown(average_secs),
        current_streak: to_breakdown(current_secs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::config::HabitConfig;
    use crate::habits::registry::HabitRegistry;
    use crate::models::habit::Habit;
    use crate::timeline::MemoryTimelineStore;

    fn services() -> (HabitRegistry, StreakEngine, Arc<MemoryTimelineStore>) {
        let store = Arc::new(MemoryTimelineStore::new());
        let registry = HabitRegistry::new(store.clone(), HabitConfig::default());
        let engine = StreakEngine::new(store.clone());
        (registry, engine, store)
    }

    fn closed(start: DateTime<Utc>, secs: i64) -> Period {
        Period {
            end_at: Some(start + Duration::seconds(secs)),
            ..Period::open(Uuid::new_v4(), start)
        }
    }

    /// Checks the timeline invariants that must hold after every operation.
    async fn assert_timeline_invariants(store: &MemoryTimelineStore, habit_id: Uuid) {
        let periods = store.periods(habit_id).await.unwrap();
        let setbacks = store.setbacks(habit_id).await.unwrap();

        let open = periods.iter().filter(|p| p.is_open()).count();
        assert_eq!(open, 1, "exactly one open period");

        let closed = periods.iter().filter(|p| !p.is_open()).count();
        assert_eq!(closed, setbacks.len(), "one setback per closed period");

        for pair in periods.windows(2) {
            assert_eq!(pair[0].end_at, Some(pair[1].start_at), "periods are contiguous");
        }
    }

    #[test]
    fn test_stats_without_closed_periods() {
        let start = Utc::now();
        let periods = vec![Period::open(Uuid::new_v4(), start)];

        let stats = compute_stats(&periods, start + Duration::seconds(125));
        assert_eq!(stats.total_setbacks, 0);
        assert_eq!(stats.average_period, TimeProgress::default());
        assert_eq!(stats.current_streak.minutes, 2);
        assert_eq!(stats.current_streak.seconds, 5);
    }

    #[test]
    fn test_average_is_floored() {
        let start = Utc::now();
        let periods = vec![closed(start, 10), closed(start, 11)];

        let stats = compute_stats(&periods, start);
        assert_eq!(stats.total_setbacks, 2);
        assert_eq!(stats.average_period.seconds, 10);
    }

    #[test]
    fn test_no_open_period_means_zero_streak() {
        let start = Utc::now();
        let stats = compute_stats(&[closed(start, 60)], start + Duration::days(3));
        assert_eq!(stats.current_streak, TimeProgress::default());
        assert_eq!(stats.total_setbacks, 1);
    }

    #[test]
    fn test_subsecond_precision_dropped_per_period() {
        let start = Utc::now();
        let period = Period {
            end_at: Some(start + Duration::milliseconds(1_900)),
            ..Period::open(Uuid::new_v4(), start)
        };
        let stats = compute_stats(&[period.clone(), period], start);
        assert_eq!(stats.average_period.seconds, 1);
    }

    #[tokio::test]
    async fn test_log_setback_scenario() {
        let (registry, engine, store) = services();
        let t0 = Utc::now();
        let habit = registry.create_habit(1, "H", t0).await.unwrap();

        let t1 = t0 + Duration::seconds(3661);
        let record = engine
            .log_setback(habit.id, Some("trigger A"), t1)
            .await
            .unwrap();
        assert_eq!(record.reason.as_deref(), Some("trigger A"));
        assert_eq!(record.occurred_at, t1);

        let stats = engine.get_stats(habit.id, t1).await.unwrap();
        assert_eq!(stats.total_setbacks, 1);
        assert_eq!(
            stats.average_period,
            TimeProgress {
                days: 0,
                hours: 1,
                minutes: 1,
                seconds: 1
            }
        );
        assert_eq!(stats.current_streak, TimeProgress::default());

        assert_timeline_invariants(&store, habit.id).await;
    }

    #[tokio::test]
    async fn test_repeated_setbacks_keep_timeline_partitioned() {
        let (registry, engine, store) = services();
        let t0 = Utc::now();
        let habit = registry.create_habit(2, "Sugar", t0).await.unwrap();

        let offsets = [60, 3_600, 86_400, 90_000];
        for secs in offsets {
            engine
                .log_setback(habit.id, None, t0 + Duration::seconds(secs))
                .await
                .unwrap();
            assert_timeline_invariants(&store, habit.id).await;
        }

        let now = t0 + Duration::seconds(100_000);
        let stats = engine.get_stats(habit.id, now).await.unwrap();
        assert_eq!(stats.total_setbacks, 4);
        // Closed lengths: 60, 3540, 82800, 3600 -> mean 22500.
        assert_eq!(stats.average_period.total_seconds(), 22_500);
        assert_eq!(stats.current_streak.total_seconds(), 10_000);

        let history = engine.list_setbacks(habit.id).await.unwrap();
        assert_eq!(history.len(), 4);
        assert!(history.windows(2).all(|w| w[0].occurred_at <= w[1].occurred_at));
    }

    #[tokio::test]
    async fn test_setback_for_unknown_habit_is_not_found() {
        let (_, engine, _) = services();
        let err = engine
            .log_setback(Uuid::new_v4(), None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_setback_on_inactive_habit_is_not_found_but_stats_remain() {
        let (registry, engine, _) = services();
        let t0 = Utc::now();
        let habit = registry.create_habit(3, "Gaming", t0).await.unwrap();
        engine
            .log_setback(habit.id, None, t0 + Duration::seconds(30))
            .await
            .unwrap();
        registry.deactivate_habit(habit.id).await.unwrap();

        let err = engine
            .log_setback(habit.id, None, t0 + Duration::seconds(60))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let stats = engine.get_stats(habit.id, t0 + Duration::seconds(60)).await.unwrap();
        assert_eq!(stats.total_setbacks, 1);
    }

    #[tokio::test]
    async fn test_missing_open_period_is_recoverable() {
        let (_, engine, store) = services();
        let now = Utc::now();
        let habit = Habit {
            id: Uuid::new_v4(),
            user_id: 4,
            name: "Broken".to_string(),
            is_active: true,
            created_at: now,
        };

        let mut tx = store.begin().await.unwrap();
        tx.ensure_user(4, now).await.unwrap();
        tx.insert_habit(&habit).await.unwrap();
        tx.commit().await.unwrap();

        let err = engine.log_setback(habit.id, None, now).await.unwrap_err();
        assert!(matches!(err, AppError::NoActivePeriod(id) if id == habit.id));
        assert!(store.periods(habit.id).await.unwrap().is_empty());

        let stats = engine.get_stats(habit.id, now).await.unwrap();
        assert_eq!(stats.current_streak, TimeProgress::default());
    }

    #[tokio::test]
    async fn test_invalid_reason_leaves_timeline_untouched() {
        let (registry, engine, store) = services();
        let now = Utc::now();
        let habit = registry.create_habit(5, "Vaping", now).await.unwrap();

        let reason = "r".repeat(501);
        let err = engine
            .log_setback(habit.id, Some(&reason), now)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidReason(_)));
        assert_eq!(store.periods(habit.id).await.unwrap().len(), 1);
        assert!(store.setbacks(habit.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clock_behind_period_start_is_clamped() {
        let (registry, engine, store) = services();
        let t0 = Utc::now();
        let habit = registry.create_habit(6, "Sleep", t0).await.unwrap();

        let record = engine
            .log_setback(habit.id, None, t0 - Duration::seconds(5))
            .await
            .unwrap();
        assert_eq!(record.occurred_at, t0);
        assert_timeline_invariants(&store, habit.id).await;
    }

    #[tokio::test]
    async fn test_concurrent_setbacks_keep_single_open_period() {
        let (registry, engine, store) = services();
        let t0 = Utc::now();
        let habit = registry.create_habit(7, "Soda", t0).await.unwrap();

        let handles: Vec<_> = (1..=8)
            .map(|i| {
                let engine = engine.clone();
                tokio::spawn(async move {
                    engine
                        .log_setback(habit.id, None, t0 + Duration::seconds(i * 10))
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_timeline_invariants(&store, habit.id).await;
        assert_eq!(store.setbacks(habit.id).await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_stats_for_unknown_habit_is_not_found() {
        let (_, engine, _) = services();
        let err = engine.get_stats(Uuid::new_v4(), Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
