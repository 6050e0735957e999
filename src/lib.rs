//! Quiz Bot Library
//!
//! Backend of a Telegram quiz bot.
//!
//! This crate provides the core functionality for:
//! - Ingesting and validating quizzes uploaded as JSON
//! - Keeping the uploaded quizzes in an in-memory registry
//! - Talking to the Telegram Bot API with strictly numeric chat ids
//! - Running timed quiz sessions with per-quiz leaderboards
//! - Serving the webhook and a small REST surface over HTTP

pub mod commands;
pub mod config;
pub mod quiz;
pub mod server;
pub mod session;
pub mod telegram;
