use std::sync::Arc;

use crate::config::HabitConfig;
use crate::conversation::store::SessionStore;
use crate::conversation::Dialog;
use crate::habits::{HabitRegistry, StreakEngine};
use crate::timeline::TimelineStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub registry: HabitRegistry,
    pub engine: StreakEngine,
    /// Chat front-end over the same registry and engine.
    pub dialog: Dialog,
}

impl AppState {
    pub fn new(
        store: Arc<dyn TimelineStore>,
        sessions: Arc<dyn SessionStore>,
        habit_config: HabitConfig,
    ) -> Self {
        let registry = HabitRegistry::new(store.clone(), habit_config);
        let engine = StreakEngine::new(store);
        let dialog = Dialog::new(registry.clone(), engine.clone(), sessions);
        Self {
            registry,
            engine,
            dialog,
        }
    }
}
