//! Command handling module.
//!
//! Parses bot commands and button callbacks, runs quiz sessions and
//! delivers the resulting replies to Telegram.

mod dispatcher;
mod handler;
mod types;

pub use dispatcher::{Dispatcher, deliver};
pub use handler::{
    CORRECT_ANIMATION_URL, CommandHandler, WRONG_ANIMATION_URL, is_quiz_file, quiz_created,
    quiz_name_from_file,
};
pub use types::{BotCommand, CallbackAction, CommandResult, QuestionTimer, Reply};
