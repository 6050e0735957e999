//! HTTP interface.
//!
//! Serves the health check, the Telegram webhook and a small REST surface
//! for submitting and reading quizzes.

mod handlers;

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Extension};
use axum::routing::{get, post};
use axum::Router;
use tokio::sync::mpsc;

use crate::quiz::QuizStore;
use crate::telegram::{TelegramBot, Update};

pub use handlers::{Delivery, SECRET_HEADER};

/// State shared by every route.
#[derive(Debug)]
pub struct AppState {
    pub store: Arc<QuizStore>,

    /// Queue feeding the update dispatcher.
    pub updates: mpsc::Sender<Update>,

    /// Expected value of the webhook secret header, if any.
    pub webhook_secret: Option<String>,

    /// Client used to announce quizzes submitted over HTTP.
    pub bot: Option<Arc<TelegramBot>>,

    /// Largest request body accepted.
    pub max_body_bytes: usize,
}

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.max_body_bytes;

    Router::new()
        .route("/", get(handlers::handle_health))
        .route("/webhook", post(handlers::handle_webhook))
        .route(
            "/quizzes",
            get(handlers::handle_list_quizzes).post(handlers::handle_create_quiz),
        )
        .route("/quizzes/:id", get(handlers::handle_get_quiz))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(Extension(state))
}
