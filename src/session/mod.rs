//! Quiz session module.
//!
//! Tracks each player's progress through a quiz and the per-quiz
//! leaderboards shown when a quiz is completed.

mod leaderboard;
mod state;

pub use leaderboard::{Leaderboard, LeaderboardEntry};
pub use state::{AnswerOutcome, QuizSession};
