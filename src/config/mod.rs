//! Configuration module for the quiz bot.
//!
//! Handles loading of the Bot API credentials, webhook settings and the
//! tunables of quiz sessions.

mod settings;

pub use settings::{BotConfig, BotSettings, ConfigError};
