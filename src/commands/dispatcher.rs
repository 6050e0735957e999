//! Update dispatcher.
//!
//! Every update queued by the webhook is processed in its own task:
//! 1. Callback queries are handled, then acknowledged with the handler's notice
//! 2. Documents are checked, downloaded and turned into quizzes
//! 3. Text messages are parsed as commands; anything else is ignored
//! 4. Replies are delivered in order; if they present a question, its timer
//!    is armed once delivery succeeded
//!
//! Delivery failures are logged. They never stop the dispatcher.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::handler::CommandHandler;
use super::types::{CommandResult, QuestionTimer, Reply};
use crate::config::BotSettings;
use crate::telegram::{
    CallbackQuery, ChatId, Document, Message, TelegramBot, TelegramError, Update, User,
};

/// Routes Telegram updates to the command handler and delivers the replies.
pub struct Dispatcher {
    bot: Arc<TelegramBot>,
    handler: Arc<CommandHandler>,

    /// Username of this bot, for `/command@botname`.
    bot_username: Option<String>,

    question_timeout: Duration,
    max_upload_bytes: u64,
}

impl Dispatcher {
    /// Creates a new dispatcher.
    #[must_use]
    pub fn new(
        bot: Arc<TelegramBot>,
        handler: Arc<CommandHandler>,
        settings: &BotSettings,
    ) -> Self {
        Self {
            bot,
            handler,
            bot_username: None,
            question_timeout: Duration::from_secs(settings.question_timeout_secs),
            max_upload_bytes: settings.max_upload_bytes,
        }
    }

    /// Sets the bot username commands may be addressed to.
    #[must_use]
    pub fn with_bot_username(mut self, username: Option<String>) -> Self {
        self.bot_username = username;
        self
    }

    /// Runs until the sending side of the queue is dropped.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<Update>) {
        info!("Update dispatcher started");

        while let Some(update) = rx.recv().await {
            let dispatcher = Arc::clone(&self);
            tokio::spawn(async move {
                dispatcher.handle_update(update).await;
            });
        }

        info!("Update queue closed, dispatcher stopping");
    }

    /// Processes a single update.
    pub async fn handle_update(self: &Arc<Self>, update: Update) {
        debug!("Processing update {}", update.update_id);

        if let Some(query) = update.callback_query {
            self.handle_callback_query(query).await;
        } else if let Some(message) = update.message {
            self.handle_message(message).await;
        } else {
            debug!("Ignoring update {} without message or callback", update.update_id);
        }
    }

    async fn handle_message(self: &Arc<Self>, message: Message) {
        let Some(user) = message.from else {
            debug!("Ignoring message {} without sender", message.message_id);
            return;
        };
        if user.is_bot {
            return;
        }
        let chat = message.chat.id;

        if let Some(document) = &message.document {
            let result = self.handle_document(&user, chat, document).await;
            self.dispatch(result).await;
            return;
        }

        let Some(text) = message.text.as_deref() else {
            return;
        };
        if let Some(result) = self
            .handler
            .try_handle(text, self.bot_username.as_deref(), &user, chat)
            .await
        {
            self.dispatch(result).await;
        }
    }

    async fn handle_document(
        &self,
        user: &User,
        chat: ChatId,
        document: &Document,
    ) -> CommandResult {
        let file_name = match self.handler.check_document(chat, document) {
            Ok(file_name) => file_name,
            Err(rejection) => return rejection,
        };

        info!("Downloading quiz file '{}' from user {}", file_name, user.id);
        match self.download(document).await {
            Ok(bytes) => self.handler.handle_upload(user, chat, file_name, &bytes).await,
            Err(TelegramError::FileTooLarge { size, max }) => {
                warn!("Quiz file '{}' is {} bytes, limit is {}", file_name, size, max);
                CommandResult::text(chat, "The file is too large.")
            }
            Err(e) => {
                error!("Failed to download quiz file '{}': {}", file_name, e);
                CommandResult::text(chat, "Could not download the file. Please try again.")
            }
        }
    }

    async fn download(&self, document: &Document) -> Result<Vec<u8>, TelegramError> {
        let file = self.bot.get_file(&document.file_id).await?;
        self.bot.download_file(&file, self.max_upload_bytes).await
    }

    async fn handle_callback_query(self: &Arc<Self>, query: CallbackQuery) {
        let Some(data) = query.data.as_deref() else {
            self.acknowledge(&query.id, None).await;
            return;
        };

        // Private chats share the user's id.
        let chat = query
            .message
            .as_ref()
            .map_or(ChatId(query.from.id.0), |m| m.chat.id);

        let result = self.handler.handle_callback(&query.from, chat, data).await;
        self.acknowledge(&query.id, result.notice.as_deref()).await;
        self.dispatch(result).await;
    }

    async fn acknowledge(&self, query_id: &str, notice: Option<&str>) {
        if let Err(e) = self.bot.answer_callback_query(query_id, notice).await {
            warn!("Failed to answer callback query: {}", e);
        }
    }

    /// Delivers a result and arms its question timer.
    async fn dispatch(self: &Arc<Self>, result: CommandResult) {
        match deliver(&self.bot, &result).await {
            Ok(()) => {
                if let Some(timer) = result.timer {
                    self.arm_timer(timer);
                }
            }
            Err(TelegramError::ChatNotFound) => {
                warn!(
                    "Chat {} not found, dropped {} replies",
                    result.chat_id,
                    result.replies.len()
                );
            }
            Err(e) => {
                error!("Failed to deliver replies to chat {}: {}", result.chat_id, e);
            }
        }
    }

    fn arm_timer(self: &Arc<Self>, timer: QuestionTimer) {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(dispatcher.question_timeout).await;
            if let Some(result) = dispatcher
                .handler
                .handle_timeout(timer.user, timer.generation)
                .await
            {
                dispatcher.dispatch(result).await;
            }
        });
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("bot_username", &self.bot_username)
            .field("question_timeout", &self.question_timeout)
            .finish_non_exhaustive()
    }
}

/// Sends the replies of `result` in order.
///
/// # Errors
///
/// Stops at and returns the first failed call.
pub async fn deliver(bot: &TelegramBot, result: &CommandResult) -> Result<(), TelegramError> {
    for reply in &result.replies {
        match reply {
            Reply::Text {
                text,
                parse_mode,
                keyboard,
            } => {
                bot.send_message(result.chat_id, text, *parse_mode, keyboard.as_ref())
                    .await?;
            }
            Reply::Animation { url } => {
                bot.send_animation(result.chat_id, url).await?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::{Quiz, QuizId, QuizStore};
    use crate::telegram::mock::MockApi;
    use crate::telegram::UserId;

    fn dispatcher_with(
        mock: &MockApi,
        store: Arc<QuizStore>,
        settings: &BotSettings,
    ) -> Arc<Dispatcher> {
        let handler = Arc::new(CommandHandler::new(store, settings.clone()));
        let dispatcher = Dispatcher::new(Arc::new(mock.bot()), handler, settings)
            .with_bot_username(Some("QuizBot".to_owned()));
        Arc::new(dispatcher)
    }

    fn dispatcher(mock: &MockApi, store: Arc<QuizStore>) -> Arc<Dispatcher> {
        dispatcher_with(mock, store, &BotSettings::default())
    }

    fn take_quiz(id: QuizId) -> Update {
        update(serde_json::json!({
            "update_id": 2,
            "callback_query": {
                "id": "cb1",
                "from": {"id": 7, "first_name": "Ada"},
                "message": {"message_id": 3, "chat": {"id": 7}},
                "data": format!("takequiz_{id}")
            }
        }))
    }

    fn sent_texts(mock: &MockApi) -> Vec<String> {
        mock.calls()
            .into_iter()
            .filter(|(method, _)| method == "sendMessage")
            .filter_map(|(_, params)| params["text"].as_str().map(str::to_owned))
            .collect()
    }

    fn update(json: serde_json::Value) -> Update {
        serde_json::from_value(json).unwrap()
    }

    fn methods(mock: &MockApi) -> Vec<String> {
        mock.calls().into_iter().map(|(method, _)| method).collect()
    }

    #[tokio::test]
    async fn test_deliver_sends_replies_in_order() {
        let mock = MockApi::accepting().await;
        let result = CommandResult::new(ChatId(42))
            .with_reply(Reply::animation("https://example.com/a.gif"))
            .with_reply(Reply::text("hello"));

        deliver(&mock.bot(), &result).await.unwrap();

        let calls = mock.calls();
        assert_eq!(calls[0].0, "sendAnimation");
        assert_eq!(calls[1].0, "sendMessage");
        assert_eq!(calls[1].1["chat_id"], serde_json::json!(42));
        assert_eq!(calls[1].1["text"], "hello");
    }

    #[tokio::test]
    async fn test_deliver_reports_chat_not_found() {
        let mock = MockApi::start(serde_json::json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: chat not found"
        }))
        .await;

        let result = CommandResult::text(ChatId(42), "hello");
        let err = deliver(&mock.bot(), &result).await.unwrap_err();
        assert!(matches!(err, TelegramError::ChatNotFound));
    }

    #[tokio::test]
    async fn test_command_message_is_answered() {
        let mock = MockApi::accepting().await;
        let dispatcher = dispatcher(&mock, Arc::new(QuizStore::new()));

        dispatcher
            .handle_update(update(serde_json::json!({
                "update_id": 1,
                "message": {
                    "message_id": 1,
                    "chat": {"id": 7},
                    "from": {"id": 7, "is_bot": false, "first_name": "Ada"},
                    "text": "/allquizzes@QuizBot"
                }
            })))
            .await;

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1["text"], "No quizzes available yet.");
    }

    #[tokio::test]
    async fn test_plain_text_and_foreign_commands_are_ignored() {
        let mock = MockApi::accepting().await;
        let dispatcher = dispatcher(&mock, Arc::new(QuizStore::new()));

        for text in ["hello", "/start@OtherBot"] {
            dispatcher
                .handle_update(update(serde_json::json!({
                    "update_id": 1,
                    "message": {
                        "message_id": 1,
                        "chat": {"id": 7},
                        "from": {"id": 7, "first_name": "Ada"},
                        "text": text
                    }
                })))
                .await;
        }

        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_extension_is_rejected_without_download() {
        let mock = MockApi::accepting().await;
        let dispatcher = dispatcher(&mock, Arc::new(QuizStore::new()));

        dispatcher
            .handle_update(update(serde_json::json!({
                "update_id": 1,
                "message": {
                    "message_id": 1,
                    "chat": {"id": 7},
                    "from": {"id": 7, "first_name": "Ada"},
                    "document": {"file_id": "abc", "file_name": "quiz.txt", "file_size": 10}
                }
            })))
            .await;

        assert_eq!(methods(&mock), ["sendMessage"]);
        assert_eq!(mock.calls()[0].1["text"], "Please upload a file with a .json extension.");
    }

    #[tokio::test]
    async fn test_take_quiz_callback_is_acknowledged_and_presents_question() {
        let mock = MockApi::accepting().await;
        let store = Arc::new(QuizStore::new());
        let quiz = store.insert("Capitals", Some(UserId(1)), Quiz::example()).await;
        let dispatcher = dispatcher(&mock, store);

        dispatcher.handle_update(take_quiz(quiz.id)).await;

        assert_eq!(methods(&mock), ["answerCallbackQuery", "sendMessage"]);
        let question = &mock.calls()[1].1;
        let text = question["text"].as_str().unwrap();
        assert!(text.contains("What is the capital of France?"));
        let data = question["reply_markup"]["inline_keyboard"][1][0]["callback_data"]
            .as_str()
            .unwrap();
        assert!(data.starts_with("answer_") && data.ends_with("_1"), "{data}");
    }

    #[tokio::test]
    async fn test_armed_timer_moves_to_next_question() {
        let mock = MockApi::accepting().await;
        let store = Arc::new(QuizStore::new());
        let quiz = store.insert("Capitals", Some(UserId(1)), Quiz::example()).await;
        let settings = BotSettings {
            question_timeout_secs: 0,
            ..BotSettings::default()
        };
        let dispatcher = dispatcher_with(&mock, store, &settings);

        dispatcher.handle_update(take_quiz(quiz.id)).await;

        // Each expired question arms the next timer until the quiz completes.
        let mut texts = Vec::new();
        for _ in 0..200 {
            texts = sent_texts(&mock);
            if texts.iter().any(|text| text.contains("Quiz Completed!")) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let timeouts = texts.iter().filter(|text| text.starts_with("⏳ Time's up!")).count();
        assert_eq!(timeouts, 3, "{texts:?}");
        assert!(texts.iter().any(|text| text.contains("John 3:16")));
        assert!(texts.last().unwrap().contains("Your score: 0/3"));
    }
}
