use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conversation::keyboards::{BTN_ADD_HABIT, BTN_LOG_SETBACK, BTN_MY_HABITS, BTN_PROGRESS};

/// What the conversation is waiting for. No stored state means idle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConversationState {
    AwaitingHabitName,
    AwaitingSetbackHabitChoice,
    AwaitingSetbackReason { habit_id: Uuid },
    AwaitingDeleteConfirmation { habit_id: Uuid },
}

/// One inbound chat event: typed text or a pressed inline button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Incoming {
    Message { text: String },
    Callback { data: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    AddHabit,
    ListHabits,
    Progress,
    LogSetback,
    History,
    Skip,
}

impl Command {
    /// Slash commands (optionally suffixed `@botname`) and main keyboard texts.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        match text {
            BTN_ADD_HABIT => return Some(Command::AddHabit),
            BTN_MY_HABITS => return Some(Command::ListHabits),
            BTN_LOG_SETBACK => return Some(Command::LogSetback),
            BTN_PROGRESS => return Some(Command::Progress),
            _ => {}
        }

        let command = text.strip_prefix('/')?;
        let command = command.split('@').next().unwrap_or(command);
        match command {
            "start" => Some(Command::Start),
            "help" => Some(Command::Help),
            "habit_add" => Some(Command::AddHabit),
            "habits" => Some(Command::ListHabits),
            "relapse" => Some(Command::LogSetback),
            "history" => Some(Command::History),
            "skip" => Some(Command::Skip),
            _ => None,
        }
    }
}

/// Inline button payloads, `<action>:<habit id>` or a bare confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Habit(Uuid),
    Stats(Uuid),
    Relapse(Uuid),
    Delete(Uuid),
    Confirm,
    Cancel,
}

impl CallbackAction {
    pub fn to_data(self) -> String {
        match self {
            CallbackAction::Habit(id) => format!("habit:{id}"),
            CallbackAction::Stats(id) => format!("stats:{id}"),
            CallbackAction::Relapse(id) => format!("relapse:{id}"),
            CallbackAction::Delete(id) => format!("delete:{id}"),
            CallbackAction::Confirm => "confirm".to_string(),
            CallbackAction::Cancel => "cancel".to_string(),
        }
    }
}

impl FromStr for CallbackAction {
    type Err = String;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        match data {
            "confirm" => return Ok(CallbackAction::Confirm),
            "cancel" => return Ok(CallbackAction::Cancel),
            _ => {}
        }

        let (action, id) = data
            .split_once(':')
            .ok_or_else(|| format!("unrecognized callback data '{data}'"))?;
        let id = Uuid::parse_str(id).map_err(|e| format!("bad habit id in '{data}': {e}"))?;

        match action {
            "habit" => Ok(CallbackAction::Habit(id)),
            "stats" => Ok(CallbackAction::Stats(id)),
            "relapse" => Ok(CallbackAction::Relapse(id)),
            "delete" => Ok(CallbackAction::Delete(id)),
            other => Err(format!("unknown callback action '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slash_commands_parse() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/habit_add"), Some(Command::AddHabit));
        assert_eq!(Command::parse("/relapse@StrongWillBot"), Some(Command::LogSetback));
        assert_eq!(Command::parse("/unknown"), None);
        assert_eq!(Command::parse("No smoking"), None);
    }

    #[test]
    fn test_keyboard_texts_parse_as_commands() {
        assert_eq!(Command::parse(BTN_MY_HABITS), Some(Command::ListHabits));
        assert_eq!(Command::parse(BTN_PROGRESS), Some(Command::Progress));
    }

    #[test]
    fn test_callback_data_parses() {
        let id = Uuid::new_v4();
        for action in [
            CallbackAction::Habit(id),
            CallbackAction::Stats(id),
            CallbackAction::Relapse(id),
            CallbackAction::Delete(id),
            CallbackAction::Confirm,
            CallbackAction::Cancel,
        ] {
            assert_eq!(action.to_data().parse::<CallbackAction>(), Ok(action));
        }
    }

    #[test]
    fn test_malformed_callback_data_is_rejected() {
        assert!("delete:not-a-uuid".parse::<CallbackAction>().is_err());
        assert!("archive:0c9a7f52-3a9a-4e0f-9a45-5b3c0e6b1a11"
            .parse::<CallbackAction>()
            .is_err());
        assert!("".parse::<CallbackAction>().is_err());
    }

    #[test]
    fn test_state_serializes_with_tag() {
        let id = Uuid::nil();
        let json = serde_json::to_value(ConversationState::AwaitingSetbackReason { habit_id: id })
            .unwrap();
        assert_eq!(json["state"], "awaiting_setback_reason");
        assert_eq!(json["habit_id"], id.to_string());
    }
}
