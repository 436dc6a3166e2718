//! Chat dialog: turns inbound events into registry/engine calls and replies.
//!
//! Pending multi-step prompts are tracked in the `SessionStore`; commands
//! always reset them. Domain failures (quota, unknown habit, broken timeline)
//! become reply text; store and session failures propagate as errors.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::conversation::keyboards::{Keyboard, Reply};
use crate::conversation::state::{CallbackAction, Command, ConversationState, Incoming};
use crate::conversation::store::SessionStore;
use crate::errors::AppError;
use crate::habits::{HabitRegistry, StreakEngine};
use crate::models::habit::Habit;

const WELCOME: &str = "👋 Welcome to Strong Will Bot! 🦾\n\n\
I'll help you track your habits and stay on the right path.\n\n\
You can:\n\
➕ Add habits to track\n\
📊 See your progress\n\
📝 Log relapses\n\
📈 View statistics\n\n\
Use the menu buttons below to get around!";

const HELP: &str = "🔍 Here's what you can do:\n\n\
Commands:\n\
/start - Show main menu\n\
/habit_add - Create new habit\n\
/habits - List your habits\n\
/relapse - Log a relapse\n\
/history - View history\n\n\
Or use the buttons below 👇";

const NAME_PROMPT: &str = "Which habit do you want to track? 🤔\n\n\
Examples:\n\
- No smoking 🚭\n\
- Daily exercise 🏃\n\
- Meditation 🧘\n\
- Healthy eating 🥗\n\n\
Enter the habit name:";

const REASON_PROMPT: &str = "Want to add a reason for the relapse? (optional)\n\
It helps to spot triggers.\n\n\
Write the reason or send /skip to skip.";

const NO_HABITS: &str = "You don't have any habits yet!\n\
Press ➕ Add Habit to create your first one.";

#[derive(Clone)]
pub struct Dialog {
    registry: HabitRegistry,
    engine: StreakEngine,
    sessions: Arc<dyn SessionStore>,
}

impl Dialog {
    pub fn new(
        registry: HabitRegistry,
        engine: StreakEngine,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            registry,
            engine,
            sessions,
        }
    }

    pub async fn handle(
        &self,
        conversation_id: &str,
        user_id: i64,
        incoming: Incoming,
        now: DateTime<Utc>,
    ) -> Result<Reply, AppError> {
        let state = self.sessions.load(conversation_id).await?;
        debug!("Conversation {conversation_id}: {incoming:?} in state {state:?}");

        let turn = Turn {
            dialog: self,
            conversation_id,
            user_id,
            now,
        };
        match incoming {
            Incoming::Message { text } => turn.on_message(state, text.trim()).await,
            Incoming::Callback { data } => turn.on_callback(state, &data).await,
        }
    }
}

/// One inbound event being processed.
struct Turn<'a> {
    dialog: &'a Dialog,
    conversation_id: &'a str,
    user_id: i64,
    now: DateTime<Utc>,
}

impl Turn<'_> {
    async fn on_message(
        &self,
        state: Option<ConversationState>,
        text: &str,
    ) -> Result<Reply, AppError> {
        match (Command::parse(text), state) {
            (Some(Command::Skip), Some(ConversationState::AwaitingSetbackReason { habit_id })) => {
                self.finish_setback(habit_id, None).await
            }
            (Some(command), _) => {
                self.clear().await?;
                self.run_command(command).await
            }
            (None, Some(ConversationState::AwaitingHabitName)) => self.finish_create(text).await,
            (None, Some(ConversationState::AwaitingSetbackReason { habit_id })) => {
                self.finish_setback(habit_id, Some(text)).await
            }
            (None, Some(ConversationState::AwaitingSetbackHabitChoice)) => {
                Ok(Reply::text("Please choose a habit from the list above."))
            }
            (None, Some(ConversationState::AwaitingDeleteConfirmation { .. })) => {
                Ok(Reply::with_keyboard(
                    "Please confirm or cancel the deletion.",
                    Keyboard::confirm(),
                ))
            }
            (None, None) => Ok(Reply::with_keyboard(
                "I didn't get that. Send /help to see what I can do.",
                Keyboard::main(),
            )),
        }
    }

    async fn on_callback(
        &self,
        state: Option<ConversationState>,
        data: &str,
    ) -> Result<Reply, AppError> {
        let action = match data.parse::<CallbackAction>() {
            Ok(action) => action,
            Err(e) => {
                debug!("Ignoring callback: {e}");
                return Ok(Reply::text("Unknown action."));
            }
        };

        let result = match (action, state) {
            (CallbackAction::Habit(id), Some(ConversationState::AwaitingSetbackHabitChoice))
            | (CallbackAction::Relapse(id), _) => self.choose_setback_habit(id).await,
            (CallbackAction::Habit(id) | CallbackAction::Stats(id), _) => self.show_stats(id).await,
            (CallbackAction::Delete(id), _) => self.ask_delete(id).await,
            (
                CallbackAction::Confirm,
                Some(ConversationState::AwaitingDeleteConfirmation { habit_id }),
            ) => self.finish_delete(habit_id).await,
            (CallbackAction::Cancel, Some(ConversationState::AwaitingDeleteConfirmation { .. })) => {
                self.clear().await?;
                Ok(Reply::text("❌ Deletion cancelled."))
            }
            (CallbackAction::Confirm | CallbackAction::Cancel, _) => {
                Ok(Reply::text("Nothing to confirm."))
            }
        };
        result.or_else(recover)
    }

    async fn run_command(&self, command: Command) -> Result<Reply, AppError> {
        match command {
            Command::Start => Ok(Reply::with_keyboard(WELCOME, Keyboard::main())),
            Command::Help => Ok(Reply::with_keyboard(HELP, Keyboard::main())),
            Command::AddHabit => {
                self.save(ConversationState::AwaitingHabitName).await?;
                Ok(Reply::text(NAME_PROMPT))
            }
            Command::ListHabits => {
                self.habit_picker("Your active habits:\nChoose one to see the details:")
                    .await
            }
            Command::Progress => {
                self.habit_picker("Choose a habit to see its progress:")
                    .await
            }
            Command::LogSetback => {
                let reply = self
                    .habit_picker("Choose the habit you relapsed on:")
                    .await?;
                if matches!(reply.keyboard, Keyboard::Inline(_)) {
                    self.save(ConversationState::AwaitingSetbackHabitChoice)
                        .await?;
                }
                Ok(reply)
            }
            Command::History => self.history().await,
            Command::Skip => Ok(Reply::text("Nothing to skip.")),
        }
    }

    async fn habit_picker(&self, prompt: &str) -> Result<Reply, AppError> {
        let habits = self.dialog.registry.list_active_habits(self.user_id).await?;
        if habits.is_empty() {
            return Ok(Reply::with_keyboard(NO_HABITS, Keyboard::main()));
        }
        Ok(Reply::with_keyboard(prompt, Keyboard::habit_list(&habits)))
    }

    async fn finish_create(&self, name: &str) -> Result<Reply, AppError> {
        match self
            .dialog
            .registry
            .create_habit(self.user_id, name, self.now)
            .await
        {
            Ok(habit) => {
                self.clear().await?;
                Ok(Reply::with_keyboard(
                    format!(
                        "✅ Habit '{}' created!\n\n\
                         I'll help you keep track of it. You can:\n\
                         📊 View stats\n\
                         📝 Log relapses\n\
                         ❌ Delete the habit",
                        habit.name
                    ),
                    Keyboard::habit_actions(habit.id),
                ))
            }
            Err(e) if e.is_input_error() => Ok(Reply::text(format!("❌ {e}\n\n{NAME_PROMPT}"))),
            Err(e) => {
                self.clear().await?;
                recover(e)
            }
        }
    }

    async fn choose_setback_habit(&self, habit_id: Uuid) -> Result<Reply, AppError> {
        let habit = self.owned_habit(habit_id).await?;
        if !habit.is_active {
            return Err(AppError::habit_not_found(habit_id));
        }
        self.save(ConversationState::AwaitingSetbackReason { habit_id })
            .await?;
        Ok(Reply::text(REASON_PROMPT))
    }

    async fn finish_setback(&self, habit_id: Uuid, reason: Option<&str>) -> Result<Reply, AppError> {
        // Sessions are per conversation, so the sender may not own the pending habit.
        let outcome = match self.owned_habit(habit_id).await {
            Ok(_) => {
                self.dialog
                    .engine
                    .log_setback(habit_id, reason, self.now)
                    .await
            }
            Err(e) => Err(e),
        };
        match outcome {
            Ok(_) => {
                self.clear().await?;
                Ok(Reply::with_keyboard(
                    "Relapse logged. Don't be discouraged, every setback is a step towards success! 💪\n\
                     Your new streak starts right now.",
                    Keyboard::main(),
                ))
            }
            Err(e) if e.is_input_error() => Ok(Reply::text(format!("❌ {e}\n\n{REASON_PROMPT}"))),
            Err(e) => {
                self.clear().await?;
                recover(e)
            }
        }
    }

    async fn show_stats(&self, habit_id: Uuid) -> Result<Reply, AppError> {
        let habit = self.owned_habit(habit_id).await?;
        let stats = self.dialog.engine.get_stats(habit_id, self.now).await?;
        Ok(Reply::with_keyboard(
            format!(
                "📊 Stats for '{}':\n\n\
                 Current streak: {}\n\
                 Total relapses: {}\n\
                 Average period: {}\n\n\
                 What would you like to do?",
                habit.name, stats.current_streak, stats.total_setbacks, stats.average_period
            ),
            Keyboard::habit_actions(habit_id),
        ))
    }

    async fn ask_delete(&self, habit_id: Uuid) -> Result<Reply, AppError> {
        let habit = self.owned_habit(habit_id).await?;
        self.save(ConversationState::AwaitingDeleteConfirmation { habit_id })
            .await?;
        Ok(Reply::with_keyboard(
            format!(
                "Are you sure you want to delete '{}'?\nIt will no longer be tracked.",
                habit.name
            ),
            Keyboard::confirm(),
        ))
    }

    async fn finish_delete(&self, habit_id: Uuid) -> Result<Reply, AppError> {
        self.clear().await?;
        self.owned_habit(habit_id).await?;
        self.dialog.registry.deactivate_habit(habit_id).await?;
        Ok(Reply::text("✅ Habit deleted."))
    }

    async fn history(&self) -> Result<Reply, AppError> {
        let habits = self.dialog.registry.list_active_habits(self.user_id).await?;
        if habits.is_empty() {
            return Ok(Reply::with_keyboard(NO_HABITS, Keyboard::main()));
        }

        let mut text = String::from("📜 Relapse history:\n");
        for habit in &habits {
            let setbacks = self.dialog.engine.list_setbacks(habit.id).await?;
            let _ = write!(text, "\n{} ({})\n", habit.name, setbacks.len());
            if setbacks.is_empty() {
                text.push_str("  no relapses yet 🎉\n");
            }
            for record in &setbacks {
                let _ = writeln!(
                    text,
                    "  • {}: {}",
                    record.occurred_at.format("%Y-%m-%d %H:%M UTC"),
                    record.reason.as_deref().unwrap_or("no reason given")
                );
            }
        }
        Ok(Reply::with_keyboard(text, Keyboard::main()))
    }

    /// Another user's habit is reported as missing.
    async fn owned_habit(&self, habit_id: Uuid) -> Result<Habit, AppError> {
        let habit = self.dialog.registry.get_habit(habit_id).await?;
        if habit.user_id != self.user_id {
            return Err(AppError::habit_not_found(habit_id));
        }
        Ok(habit)
    }

    async fn save(&self, state: ConversationState) -> Result<(), AppError> {
        Ok(self.dialog.sessions.save(self.conversation_id, &state).await?)
    }

    async fn clear(&self) -> Result<(), AppError> {
        Ok(self.dialog.sessions.clear(self.conversation_id).await?)
    }
}

/// Domain failures become a chat reply; infrastructure failures propagate.
fn recover(err: AppError) -> Result<Reply, AppError> {
    match err {
        AppError::QuotaExceeded { .. }
        | AppError::InvalidName(_)
        | AppError::InvalidReason(_)
        | AppError::NotFound(_)
        | AppError::NoActivePeriod(_) => Ok(Reply::text(format!("❌ Error: {err}"))),
        other => Err(other),
    }
}
