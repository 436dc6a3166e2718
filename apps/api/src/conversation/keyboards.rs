use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conversation::state::CallbackAction;
use crate::models::habit::Habit;

pub const BTN_ADD_HABIT: &str = "➕ Add Habit";
pub const BTN_MY_HABITS: &str = "📊 My Habits";
pub const BTN_LOG_SETBACK: &str = "📝 Log Relapse";
pub const BTN_PROGRESS: &str = "📈 Progress";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub text: String,
    pub callback_data: String,
}

impl Button {
    fn new(text: impl Into<String>, action: CallbackAction) -> Self {
        Self {
            text: text.into(),
            callback_data: action.to_data(),
        }
    }
}

/// Layout only; the transport decides how to draw it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "rows", rename_all = "snake_case")]
pub enum Keyboard {
    None,
    /// Persistent reply keyboard; pressing a button sends its text.
    Reply(Vec<Vec<String>>),
    Inline(Vec<Vec<Button>>),
}

impl Keyboard {
    pub fn main() -> Self {
        Keyboard::Reply(vec![
            vec![BTN_ADD_HABIT.to_string(), BTN_MY_HABITS.to_string()],
            vec![BTN_LOG_SETBACK.to_string(), BTN_PROGRESS.to_string()],
        ])
    }

    pub fn habit_list(habits: &[Habit]) -> Self {
        Keyboard::Inline(
            habits
                .iter()
                .map(|h| vec![Button::new(&h.name, CallbackAction::Habit(h.id))])
                .collect(),
        )
    }

    pub fn habit_actions(habit_id: Uuid) -> Self {
        Keyboard::Inline(vec![
            vec![
                Button::new("📊 View Stats", CallbackAction::Stats(habit_id)),
                Button::new("📝 Log Relapse", CallbackAction::Relapse(habit_id)),
            ],
            vec![Button::new("❌ Delete", CallbackAction::Delete(habit_id))],
        ])
    }

    pub fn confirm() -> Self {
        Keyboard::Inline(vec![vec![
            Button::new("✅ Yes", CallbackAction::Confirm),
            Button::new("❌ No", CallbackAction::Cancel),
        ]])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,
    pub keyboard: Keyboard,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: Keyboard::None,
        }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self {
            text: text.into(),
            keyboard,
        }
    }
}
