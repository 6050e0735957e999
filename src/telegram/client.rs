//! Bot API client.

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::types::{
    ApiResponse, File, InlineKeyboardMarkup, ParseMode, SentMessage, User, WebhookInfo,
};
use super::{ChatId, RateLimiter};
use crate::config::BotConfig;

/// Updates the bot subscribes to.
const ALLOWED_UPDATES: [&str; 2] = ["message", "callback_query"];

/// Errors that can occur during Bot API calls.
#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Chat not found")]
    ChatNotFound,

    #[error("Flood wait required: {0} seconds")]
    FloodWait(u32),

    #[error("Bot API error {code}: {description}")]
    Api { code: u16, description: String },

    #[error("Bot API returned no result for {0}")]
    MissingResult(String),

    #[error("File has no download path")]
    MissingFilePath,

    #[error("File too large: {size} bytes (max: {max})")]
    FileTooLarge { size: u64, max: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Converts an API envelope into the call result.
fn into_result<R>(method: &str, response: ApiResponse<R>) -> Result<R, TelegramError> {
    if response.ok {
        return response
            .result
            .ok_or_else(|| TelegramError::MissingResult(method.to_owned()));
    }

    if let Some(seconds) = response.parameters.as_ref().and_then(|p| p.retry_after) {
        return Err(TelegramError::FloodWait(seconds));
    }

    let description = response.description.unwrap_or_default();
    if description.to_lowercase().contains("chat not found") {
        return Err(TelegramError::ChatNotFound);
    }

    Err(TelegramError::Api {
        code: response.error_code.unwrap_or_default(),
        description,
    })
}

#[derive(Serialize)]
struct NoParams {}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: ChatId,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboardMarkup>,
}

#[derive(Serialize)]
struct SendAnimation<'a> {
    chat_id: ChatId,
    animation: &'a str,
}

#[derive(Serialize)]
struct AnswerCallbackQuery<'a> {
    callback_query_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

#[derive(Serialize)]
struct GetFile<'a> {
    file_id: &'a str,
}

#[derive(Serialize)]
struct SetWebhook<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    secret_token: Option<&'a str>,
    allowed_updates: &'a [&'a str],
}

/// High-level Bot API client.
pub struct TelegramBot {
    /// Shared HTTP connection pool.
    http: reqwest::Client,

    /// `{base}/bot{token}`; method names are appended.
    api_url: String,

    /// `{base}/file/bot{token}`; file paths are appended.
    file_url: String,

    /// Pacing for outgoing calls.
    rate_limiter: RateLimiter,
}

impl TelegramBot {
    /// Creates a client for the configured bot.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &BotConfig, min_send_interval_ms: u64) -> Result<Self, TelegramError> {
        let base = config.api_base_url.trim_end_matches('/');
        let http = reqwest::Client::builder()
            .user_agent(concat!("quiz_bot/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            api_url: format!("{base}/bot{}", config.api_token),
            file_url: format!("{base}/file/bot{}", config.api_token),
            rate_limiter: RateLimiter::from_millis(min_send_interval_ms),
        })
    }

    /// Performs one API call, retrying once after a flood wait.
    async fn call<P, R>(&self, method: &str, params: &P) -> Result<R, TelegramError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        match self.call_once(method, params).await {
            Err(TelegramError::FloodWait(seconds)) => {
                self.rate_limiter.handle_flood_wait(seconds).await;
                self.call_once(method, params).await
            }
            result => result,
        }
    }

    async fn call_once<P, R>(&self, method: &str, params: &P) -> Result<R, TelegramError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let waited = self.rate_limiter.wait_and_acquire().await;
        if !waited.is_zero() {
            debug!("Waited {:?} for rate limit before {}", waited, method);
        }

        let response: ApiResponse<R> = self
            .http
            .post(format!("{}/{method}", self.api_url))
            .json(params)
            .send()
            .await?
            .json()
            .await?;

        into_result(method, response)
    }

    /// Returns the bot's own account.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", &NoParams {}).await
    }

    /// Sends a text message.
    ///
    /// # Errors
    ///
    /// Returns [`TelegramError::ChatNotFound`] when the chat cannot be
    /// reached, or another error if the call fails.
    pub async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        parse_mode: Option<ParseMode>,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<SentMessage, TelegramError> {
        debug!(
            "Sending message to chat {}: \"{}\"",
            chat_id,
            truncate_for_log(text, 30)
        );
        let params = SendMessage {
            chat_id,
            text,
            parse_mode,
            reply_markup: keyboard,
        };
        self.call("sendMessage", &params).await
    }

    /// Sends an animation (GIF) by URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn send_animation(
        &self,
        chat_id: ChatId,
        url: &str,
    ) -> Result<SentMessage, TelegramError> {
        let params = SendAnimation {
            chat_id,
            animation: url,
        };
        self.call("sendAnimation", &params).await
    }

    /// Acknowledges a button press, optionally showing a short notice.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn answer_callback_query(
        &self,
        id: &str,
        text: Option<&str>,
    ) -> Result<(), TelegramError> {
        let params = AnswerCallbackQuery {
            callback_query_id: id,
            text,
        };
        let _: bool = self.call("answerCallbackQuery", &params).await?;
        Ok(())
    }

    /// Resolves a file id into a downloadable file.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn get_file(&self, file_id: &str) -> Result<File, TelegramError> {
        self.call("getFile", &GetFile { file_id }).await
    }

    /// Downloads the contents of a file, refusing anything above `max_bytes`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file has no path, is too large, or the
    /// download fails.
    pub async fn download_file(
        &self,
        file: &File,
        max_bytes: u64,
    ) -> Result<Vec<u8>, TelegramError> {
        if let Some(size) = file.file_size
            && size > max_bytes
        {
            return Err(TelegramError::FileTooLarge { size, max: max_bytes });
        }

        let path = file.file_path.as_deref().ok_or(TelegramError::MissingFilePath)?;
        let bytes = self
            .http
            .get(format!("{}/{path}", self.file_url))
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        let size = bytes.len() as u64;
        if size > max_bytes {
            return Err(TelegramError::FileTooLarge { size, max: max_bytes });
        }
        Ok(bytes.to_vec())
    }

    /// Returns the current webhook registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn get_webhook_info(&self) -> Result<WebhookInfo, TelegramError> {
        self.call("getWebhookInfo", &NoParams {}).await
    }

    /// Registers `url` as the webhook.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn set_webhook(&self, url: &str, secret: Option<&str>) -> Result<(), TelegramError> {
        let params = SetWebhook {
            url,
            secret_token: secret,
            allowed_updates: &ALLOWED_UPDATES,
        };
        let _: bool = self.call("setWebhook", &params).await?;
        Ok(())
    }

    /// Points the webhook at `url` unless it already is.
    ///
    /// # Errors
    ///
    /// Returns an error if either call fails.
    pub async fn sync_webhook(&self, url: &str, secret: Option<&str>) -> Result<(), TelegramError> {
        let current = self.get_webhook_info().await?;
        if current.url == url {
            info!(
                "Webhook already registered ({} pending updates)",
                current.pending_update_count
            );
            return Ok(());
        }

        if !current.url.is_empty() {
            warn!("Replacing existing webhook registration");
        }
        self.set_webhook(url, secret).await?;
        info!("Webhook registered");
        Ok(())
    }
}

impl std::fmt::Debug for TelegramBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramBot")
            .field("rate_limiter", &self.rate_limiter)
            .finish_non_exhaustive()
    }
}

/// Truncates a string for logging purposes.
fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_owned()
    } else {
        format!("{}...", s.chars().take(max_len).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::mock::MockApi;
    use crate::telegram::types::ResponseParameters;

    fn failure(code: u16, description: &str) -> ApiResponse<SentMessage> {
        ApiResponse {
            ok: false,
            result: None,
            error_code: Some(code),
            description: Some(description.to_owned()),
            parameters: None,
        }
    }

    #[test]
    fn test_chat_not_found_is_distinct() {
        let response = failure(400, "Bad Request: chat not found");
        let err = into_result("sendMessage", response).unwrap_err();
        assert!(matches!(err, TelegramError::ChatNotFound));
    }

    #[test]
    fn test_flood_wait_is_detected() {
        let mut response = failure(429, "Too Many Requests: retry after 7");
        response.parameters = Some(ResponseParameters {
            retry_after: Some(7),
        });
        assert!(matches!(
            into_result("sendMessage", response),
            Err(TelegramError::FloodWait(7))
        ));
    }

    #[test]
    fn test_other_api_errors_keep_details() {
        let response = failure(403, "Forbidden: bot was blocked by the user");
        let err = into_result("sendMessage", response).unwrap_err();
        match err {
            TelegramError::Api { code, description } => {
                assert_eq!(code, 403);
                assert!(description.contains("blocked"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_ok_without_result() {
        let response: ApiResponse<bool> = ApiResponse {
            ok: true,
            result: None,
            error_code: None,
            description: None,
            parameters: None,
        };
        assert!(matches!(
            into_result("setWebhook", response),
            Err(TelegramError::MissingResult(_))
        ));
    }

    #[test]
    fn test_text_chat_id_is_sent_as_integer() {
        let chat_id: ChatId = "123456".parse().unwrap();
        let params = SendMessage {
            chat_id,
            text: "hello",
            parse_mode: None,
            reply_markup: None,
        };
        let body = serde_json::to_value(&params).unwrap();
        assert_eq!(body["chat_id"], serde_json::json!(123_456));
        assert!(body["chat_id"].is_i64());
        assert!(body.get("parse_mode").is_none());
    }

    #[tokio::test]
    async fn test_flood_wait_is_retried_once() {
        let mock = MockApi::start(serde_json::json!({
            "ok": false,
            "error_code": 429,
            "description": "Too Many Requests: retry after 0",
            "parameters": {"retry_after": 0}
        }))
        .await;

        let err = mock
            .bot()
            .send_message(ChatId(42), "hello", None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, TelegramError::FloodWait(0)));
        let calls = mock.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|(method, params)| {
            method == "sendMessage" && params["text"] == "hello"
        }));
    }

    #[tokio::test]
    async fn test_successful_call_is_not_repeated() {
        let mock = MockApi::accepting().await;
        let sent = mock
            .bot()
            .send_message(ChatId(42), "hello", None, None)
            .await
            .unwrap();
        assert_eq!(sent.message_id, 1);
        assert_eq!(mock.calls().len(), 1);
    }

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("Hello", 10), "Hello");
        assert_eq!(truncate_for_log("Hello, World!", 5), "Hello...");
    }
}
