//! Telegram Bot API module.
//!
//! Provides the HTTPS client used to talk to Telegram, the update and
//! keyboard types it exchanges, and outgoing-call rate limiting.

mod chat_id;
mod client;
#[cfg(test)]
pub(crate) mod mock;
mod rate_limiter;
mod types;

pub use chat_id::{ChatId, ChatIdError};
pub use client::{TelegramBot, TelegramError};
pub use rate_limiter::RateLimiter;
pub use types::{
    CallbackQuery, Chat, Document, File, InlineKeyboardButton, InlineKeyboardMarkup, Message,
    ParseMode, SentMessage, Update, User, UserId,
};
