// Chat transport glue: conversation state machine, session storage and
// reply layouts. Drives the Habit Registry and Streak Engine like any other client.

pub mod dialog;
pub mod handlers;
pub mod keyboards;
pub mod state;
pub mod store;

pub use dialog::Dialog;
