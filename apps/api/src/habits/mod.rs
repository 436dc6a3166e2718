// Habit Registry + Streak/Stats Engine.
// Both operate against the Timeline Store; neither keeps in-process state.

pub mod engine;
pub mod handlers;
pub mod progress;
pub mod registry;
pub mod validation;

pub use engine::StreakEngine;
pub use registry::HabitRegistry;
