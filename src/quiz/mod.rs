//! Quiz module.
//!
//! Validates uploaded quiz JSON and keeps the resulting quizzes in an
//! in-memory registry.

mod question;
mod store;

pub use question::{Quiz, QuizQuestion, ValidationError};
pub use store::{DEFAULT_QUIZ_NAME, QuizId, QuizStore, StoredQuiz};

/// Minimum number of options a question needs to be answerable.
pub const MIN_OPTIONS: usize = 2;
