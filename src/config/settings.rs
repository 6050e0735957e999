//! Application settings and Bot API configuration.

use serde::{Deserialize, Serialize};

/// Telegram Bot API configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Bot token issued by `@BotFather`.
    pub api_token: String,

    /// Public base URL of this service; the webhook is registered at
    /// `{webhook_url}/webhook`. Without it no updates are received.
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Secret Telegram echoes in `X-Telegram-Bot-Api-Secret-Token`.
    #[serde(default)]
    pub webhook_secret: Option<String>,

    /// Port the HTTP server listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bot API base URL.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

fn default_port() -> u16 {
    8000
}

fn default_api_base_url() -> String {
    "https://api.telegram.org".to_owned()
}

impl BotConfig {
    /// Creates a new configuration with defaults for everything but the token.
    #[must_use]
    pub fn new(api_token: String) -> Self {
        Self {
            api_token,
            webhook_url: None,
            webhook_secret: None,
            port: default_port(),
            api_base_url: default_api_base_url(),
        }
    }

    /// Creates configuration from environment variables.
    ///
    /// Expects `BOT_API_KEY` to be set; `WEBHOOK_URL`, `WEBHOOK_SECRET`,
    /// `PORT` and `TELEGRAM_API_URL` are optional.
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_token =
            non_empty_var("BOT_API_KEY").ok_or(ConfigError::MissingEnvVar("BOT_API_KEY"))?;

        let port = match std::env::var("PORT") {
            Ok(value) => value.trim().parse().map_err(|_| ConfigError::InvalidPort(value))?,
            Err(_) => default_port(),
        };

        let webhook_url = non_empty_var("WEBHOOK_URL")
            .map(|url| url.trim_end_matches('/').to_owned());
        if let Some(url) = &webhook_url
            && !url.starts_with("https://")
        {
            return Err(ConfigError::InsecureWebhookUrl(url.clone()));
        }

        Ok(Self {
            api_token,
            webhook_url,
            webhook_secret: non_empty_var("WEBHOOK_SECRET"),
            port,
            api_base_url: non_empty_var("TELEGRAM_API_URL").unwrap_or_else(default_api_base_url),
        })
    }

    /// Full URL Telegram should post updates to.
    #[must_use]
    pub fn webhook_endpoint(&self) -> Option<String> {
        self.webhook_url.as_ref().map(|base| format!("{base}/webhook"))
    }
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("api_token", &mask_token(&self.api_token))
            .field("webhook_url", &self.webhook_url)
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "***"))
            .field("port", &self.port)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Masks a bot token for logging (keeps the numeric bot id).
fn mask_token(token: &str) -> String {
    match token.split_once(':') {
        Some((bot_id, _)) => format!("{bot_id}:***"),
        None => "***".to_owned(),
    }
}

/// Bot behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    /// Seconds a player has to answer a question.
    #[serde(default = "default_question_timeout")]
    pub question_timeout_secs: u64,

    /// Minimum interval between Bot API calls in milliseconds.
    #[serde(default = "default_min_send_interval")]
    pub min_send_interval_ms: u64,

    /// Number of leaderboard entries shown after a quiz.
    #[serde(default = "default_leaderboard_size")]
    pub leaderboard_size: usize,

    /// Largest quiz document accepted for upload.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    /// Capacity of the webhook-to-dispatcher update queue.
    #[serde(default = "default_update_queue_size")]
    pub update_queue_size: usize,
}

fn default_question_timeout() -> u64 {
    20
}

fn default_min_send_interval() -> u64 {
    35 // ~30 calls per second
}

fn default_leaderboard_size() -> usize {
    5
}

fn default_max_upload_bytes() -> u64 {
    1024 * 1024
}

fn default_update_queue_size() -> usize {
    100
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            question_timeout_secs: default_question_timeout(),
            min_send_interval_ms: default_min_send_interval(),
            leaderboard_size: default_leaderboard_size(),
            max_upload_bytes: default_max_upload_bytes(),
            update_queue_size: default_update_queue_size(),
        }
    }
}

impl BotSettings {
    /// Creates bot settings from environment variables with defaults.
    #[must_use]
    pub fn from_env_with_defaults() -> Self {
        Self {
            question_timeout_secs: parsed_var("QUESTION_TIMEOUT")
                .filter(|&secs| secs > 0)
                .unwrap_or_else(default_question_timeout),
            min_send_interval_ms: parsed_var("MIN_SEND_INTERVAL_MS")
                .unwrap_or_else(default_min_send_interval),
            leaderboard_size: parsed_var("LEADERBOARD_SIZE")
                .filter(|&size| size > 0)
                .unwrap_or_else(default_leaderboard_size),
            max_upload_bytes: parsed_var("MAX_UPLOAD_BYTES")
                .unwrap_or_else(default_max_upload_bytes),
            update_queue_size: parsed_var("UPDATE_QUEUE_SIZE")
                .filter(|&size| size > 0)
                .unwrap_or_else(default_update_queue_size),
        }
    }
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid PORT value '{0}' (must be an integer between 0 and 65535)")]
    InvalidPort(String),

    #[error("WEBHOOK_URL must use https, got '{0}'")]
    InsecureWebhookUrl(String),
}
