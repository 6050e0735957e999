//! In-memory quiz registry.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use super::Quiz;
use crate::telegram::UserId;

/// Name given to quizzes uploaded without one.
pub const DEFAULT_QUIZ_NAME: &str = "Untitled quiz";

/// Sequential identifier of a registered quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuizId(pub u64);

impl fmt::Display for QuizId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QuizId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// A validated quiz together with its registry metadata.
#[derive(Debug, Clone, Serialize)]
pub struct StoredQuiz {
    pub id: QuizId,
    pub name: String,
    /// Telegram user who uploaded the quiz, if it came through the bot.
    pub creator: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub quiz: Quiz,
}

/// Registry of every quiz ingested during the process lifetime.
#[derive(Debug)]
pub struct QuizStore {
    quizzes: RwLock<BTreeMap<QuizId, Arc<StoredQuiz>>>,
    next_id: AtomicU64,
}

impl Default for QuizStore {
    fn default() -> Self {
        Self::new()
    }
}

impl QuizStore {
    /// Creates an empty registry. Ids start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            quizzes: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a quiz under the next free id.
    pub async fn insert(&self, name: &str, creator: Option<UserId>, quiz: Quiz) -> Arc<StoredQuiz> {
        let id = QuizId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let name = match name.trim() {
            "" => DEFAULT_QUIZ_NAME.to_owned(),
            trimmed => trimmed.to_owned(),
        };

        let stored = Arc::new(StoredQuiz {
            id,
            name,
            creator,
            created_at: Utc::now(),
            quiz,
        });
        self.quizzes.write().await.insert(id, Arc::clone(&stored));

        info!(
            "Registered quiz {} \"{}\" ({} questions)",
            id,
            stored.name,
            stored.quiz.len()
        );
        stored
    }

    /// Looks up a quiz by id.
    pub async fn get(&self, id: QuizId) -> Option<Arc<StoredQuiz>> {
        self.quizzes.read().await.get(&id).cloned()
    }

    /// Returns the quizzes uploaded by `user`, oldest first.
    pub async fn by_creator(&self, user: UserId) -> Vec<Arc<StoredQuiz>> {
        self.quizzes
            .read()
            .await
            .values()
            .filter(|q| q.creator == Some(user))
            .cloned()
            .collect()
    }

    /// Returns every registered quiz, oldest first.
    pub async fn all(&self) -> Vec<Arc<StoredQuiz>> {
        self.quizzes.read().await.values().cloned().collect()
    }

    /// Returns the number of registered quizzes.
    pub async fn len(&self) -> usize {
        self.quizzes.read().await.len()
    }

    /// Checks if no quiz has been registered yet.
    pub async fn is_empty(&self) -> bool {
        self.quizzes.read().await.is_empty()
    }
}
