//! Per-user quiz progress.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::quiz::{QuizQuestion, StoredQuiz};
use crate::telegram::ChatId;

/// Source of question generations, unique for the whole process so a timer of
/// a replaced session never matches the new one.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Outcome of answering the current question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerOutcome {
    Correct {
        question: String,
        chosen: String,
    },
    Wrong {
        correct: String,
    },
    /// The button belongs to a question that is no longer current.
    Stale,
    /// The quiz is already finished.
    Finished,
    /// The option index does not exist.
    InvalidOption,
}

/// A user's progress through one quiz.
#[derive(Debug, Clone)]
pub struct QuizSession {
    quiz: Arc<StoredQuiz>,
    chat_id: ChatId,
    current: usize,
    score: u32,
    /// Generation of the question awaiting an answer, 0 when there is none.
    /// Answer buttons and timers compare against it.
    generation: u64,
    finished: bool,
}

impl QuizSession {
    /// Starts a session at the first question.
    #[must_use]
    pub fn new(quiz: Arc<StoredQuiz>, chat_id: ChatId) -> Self {
        Self {
            quiz,
            chat_id,
            current: 0,
            score: 0,
            generation: 0,
            finished: false,
        }
    }

    #[must_use]
    pub fn quiz(&self) -> &Arc<StoredQuiz> {
        &self.quiz
    }

    #[must_use]
    pub const fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    /// Zero-based index of the current question.
    #[must_use]
    pub const fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub const fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.quiz.quiz.len()
    }

    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Marks the current question as presented and returns it with the new
    /// generation. Marks the session finished when no question is left.
    pub fn present(&mut self) -> Option<(u64, &QuizQuestion)> {
        if self.current >= self.total() {
            self.finished = true;
            return None;
        }
        let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
        self.generation = generation;
        self.quiz.quiz.get(self.current).map(|q| (generation, q))
    }

    /// Answers the question presented as `generation` with option `choice`.
    ///
    /// A button shown for any other presentation carries another generation
    /// and is stale. An accepted answer moves the session on.
    pub fn answer(&mut self, generation: u64, choice: usize) -> AnswerOutcome {
        if self.finished {
            return AnswerOutcome::Finished;
        }
        if generation == 0 || generation != self.generation {
            return AnswerOutcome::Stale;
        }
        let Some(question) = self.quiz.quiz.get(self.current) else {
            return AnswerOutcome::Finished;
        };
        let Some(chosen) = question.options.get(choice) else {
            return AnswerOutcome::InvalidOption;
        };

        let outcome = if question.is_correct(choice) {
            self.score += 1;
            AnswerOutcome::Correct {
                question: question.question.clone(),
                chosen: chosen.clone(),
            }
        } else {
            AnswerOutcome::Wrong {
                correct: question.correct_answer().unwrap_or_default().to_owned(),
            }
        };
        self.current += 1;
        self.generation = 0;
        outcome
    }

    /// Skips the current question if `generation` is still the one presented.
    ///
    /// Returns `true` when the session advanced.
    pub fn expire(&mut self, generation: u64) -> bool {
        if self.finished || generation == 0 || generation != self.generation {
            return false;
        }
        self.current += 1;
        self.generation = 0;
        true
    }

    /// Starts the same quiz over.
    pub fn restart(&mut self) {
        self.current = 0;
        self.score = 0;
        self.generation = 0;
        self.finished = false;
    }
}
