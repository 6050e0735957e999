//! Route handlers.
//!
//! Quiz submissions answer 422 with the failing question and field; a
//! failed announcement to a chat is reported in the 201 body instead.

use std::str::FromStr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Extension, Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::AppState;
use crate::commands::{deliver, quiz_created};
use crate::quiz::{Quiz, QuizId, StoredQuiz, ValidationError};
use crate::telegram::{ChatId, TelegramError, Update};

/// Header Telegram uses to echo the webhook secret.
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
}

pub async fn handle_health() -> Json<Health> {
    Json(Health { status: "ok" })
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Queues an update for the dispatcher.
pub async fn handle_webhook(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(secret) = &state.webhook_secret {
        let provided = headers.get(SECRET_HEADER).and_then(|val| val.to_str().ok());
        if provided != Some(secret.as_str()) {
            warn!("Rejected webhook call with a missing or wrong secret");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    // Telegram retries anything but 2xx, so undecodable updates are acknowledged.
    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(err) => {
            warn!("Failed to decode webhook update: {}", err);
            return Json(WebhookAck {
                ok: false,
                error: Some(err.to_string()),
            })
            .into_response();
        }
    };

    let update_id = update.update_id;
    if state.updates.send(update).await.is_err() {
        error!("Update queue closed, dropping update {}", update_id);
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    Json(WebhookAck { ok: true, error: None }).into_response()
}

#[derive(Debug, Deserialize)]
pub struct CreateQuizParams {
    #[serde(default)]
    pub name: Option<String>,
    /// Kept as text so a non-numeric value is answered with a clear 400.
    #[serde(default)]
    pub chat_id: Option<String>,
}

/// Outcome of announcing a new quiz to a chat.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Delivery {
    NotRequested,
    Sent { chat_id: ChatId },
    ChatNotFound { chat_id: ChatId },
    Failed { chat_id: ChatId, error: String },
    Unavailable { chat_id: ChatId },
}

#[derive(Debug, Serialize)]
pub struct CreatedQuiz {
    pub id: QuizId,
    pub name: String,
    pub questions: usize,
    pub delivery: Delivery,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub index: Option<usize>,
    pub field: Option<String>,
}

impl ErrorBody {
    fn message(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            index: None,
            field: None,
        }
    }
}

impl From<&ValidationError> for ErrorBody {
    fn from(err: &ValidationError) -> Self {
        Self {
            error: err.to_string(),
            index: err.index(),
            field: err.field().map(str::to_owned),
        }
    }
}

/// Ingests a quiz posted as the raw JSON array.
pub async fn handle_create_quiz(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<CreateQuizParams>,
    body: Bytes,
) -> Response {
    let chat_id = match params.chat_id.as_deref().map(ChatId::from_str).transpose() {
        Ok(chat_id) => chat_id,
        Err(err) => {
            let body = ErrorBody::message(err.to_string());
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }
    };

    let quiz = match Quiz::ingest_slice(&body) {
        Ok(quiz) => quiz,
        Err(err) => {
            warn!("Rejected quiz submission: {}", err);
            return (StatusCode::UNPROCESSABLE_ENTITY, Json(ErrorBody::from(&err))).into_response();
        }
    };

    let stored = state
        .store
        .insert(params.name.as_deref().unwrap_or_default(), None, quiz)
        .await;

    let delivery = match chat_id {
        Some(chat_id) => announce(&state, chat_id, &stored).await,
        None => Delivery::NotRequested,
    };

    let created = CreatedQuiz {
        id: stored.id,
        name: stored.name.clone(),
        questions: stored.quiz.len(),
        delivery,
    };
    (StatusCode::CREATED, Json(created)).into_response()
}

async fn announce(state: &AppState, chat_id: ChatId, quiz: &StoredQuiz) -> Delivery {
    let Some(bot) = &state.bot else {
        return Delivery::Unavailable { chat_id };
    };

    match deliver(bot, &quiz_created(chat_id, quiz)).await {
        Ok(()) => {
            info!("Announced quiz {} to chat {}", quiz.id, chat_id);
            Delivery::Sent { chat_id }
        }
        Err(TelegramError::ChatNotFound) => {
            warn!("Cannot announce quiz {}: chat {} not found", quiz.id, chat_id);
            Delivery::ChatNotFound { chat_id }
        }
        Err(err) => {
            error!(
                "Failed to announce quiz {} to chat {}: {}",
                quiz.id, chat_id, err
            );
            Delivery::Failed {
                chat_id,
                error: err.to_string(),
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QuizSummary {
    pub id: QuizId,
    pub name: String,
    pub questions: usize,
    pub created_at: DateTime<Utc>,
}

pub async fn handle_list_quizzes(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<Vec<QuizSummary>> {
    let quizzes = state.store.all().await;
    Json(
        quizzes
            .iter()
            .map(|q| QuizSummary {
                id: q.id,
                name: q.name.clone(),
                questions: q.quiz.len(),
                created_at: q.created_at,
            })
            .collect(),
    )
}

/// Returns the quiz in its upload format.
pub async fn handle_get_quiz(
    Path(id): Path<u64>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Quiz>, (StatusCode, Json<ErrorBody>)> {
    state
        .store
        .get(QuizId(id))
        .await
        .map(|stored| Json(stored.quiz.clone()))
        .ok_or_else(|| (StatusCode::NOT_FOUND, Json(ErrorBody::message("Quiz not found"))))
}
