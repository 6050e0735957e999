//! In-process Bot API stand-in for tests.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::http::Uri;
use axum::{Extension, Json, Router};
use serde_json::Value;
use tokio::net::TcpListener;

use super::TelegramBot;
use crate::config::BotConfig;

const TOKEN: &str = "123";

#[derive(Default)]
struct Recorded {
    calls: Mutex<Vec<(String, Value)>>,
}

/// Answers every Bot API call with one canned envelope and records the calls.
pub struct MockApi {
    addr: SocketAddr,
    recorded: Arc<Recorded>,
}

impl MockApi {
    /// Serves `response` for every call.
    pub async fn start(response: Value) -> Self {
        let recorded = Arc::new(Recorded::default());
        let app = Router::new()
            .fallback(record)
            .layer(Extension(Arc::clone(&recorded)))
            .layer(Extension(Arc::new(response)));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, recorded }
    }

    /// Answers every call with `{"ok": true, "result": {"message_id": 1}}`.
    pub async fn accepting() -> Self {
        Self::start(serde_json::json!({"ok": true, "result": {"message_id": 1}})).await
    }

    /// A client pointed at this server.
    pub fn bot(&self) -> TelegramBot {
        let mut config = BotConfig::new(TOKEN.to_owned());
        config.api_base_url = format!("http://{}", self.addr);
        TelegramBot::new(&config, 0).unwrap()
    }

    /// Method names and parameters received so far.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.recorded.calls.lock().unwrap().clone()
    }
}

async fn record(
    Extension(recorded): Extension<Arc<Recorded>>,
    Extension(response): Extension<Arc<Value>>,
    uri: Uri,
    body: String,
) -> Json<Value> {
    let method = uri.path().rsplit('/').next().unwrap_or_default().to_owned();
    let params = serde_json::from_str(&body).unwrap_or(Value::Null);
    recorded.calls.lock().unwrap().push((method, params));
    Json(response.as_ref().clone())
}
