//! Quiz Bot - Main Entry Point
//!
//! A Telegram bot that turns uploaded JSON files into quizzes and runs
//! timed quiz sessions, receiving its updates through a webhook.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use quiz_bot::commands::{CommandHandler, Dispatcher};
use quiz_bot::config::{BotConfig, BotSettings};
use quiz_bot::quiz::{Quiz, QuizStore};
use quiz_bot::server::{self, AppState};
use quiz_bot::telegram::TelegramBot;

/// Telegram quiz bot backend.
#[derive(Parser, Debug)]
#[command(name = "quiz_bot")]
#[command(about = "Create and take quizzes on Telegram from JSON files")]
#[command(version)]
struct Args {
    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Port to listen on (overrides PORT).
    #[arg(short, long)]
    port: Option<u16>,

    /// Generate an example quiz file and exit.
    #[arg(long)]
    generate_example: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level);

    if args.generate_example {
        return generate_example_quiz();
    }

    // Load environment variables
    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    // Load configurations
    let mut config =
        BotConfig::from_env().context("Failed to load bot configuration from environment")?;
    if let Some(port) = args.port {
        config.port = port;
    }
    let settings = BotSettings::from_env_with_defaults();
    debug!("Configuration: {:?}, settings: {:?}", config, settings);

    // Connect to the Bot API
    let bot = TelegramBot::new(&config, settings.min_send_interval_ms)
        .context("Failed to create Bot API client")?;
    let bot = Arc::new(bot);
    let me = bot
        .get_me()
        .await
        .context("Failed to reach the Bot API (is BOT_API_KEY correct?)")?;
    info!(
        "Authorized as @{}",
        me.username.as_deref().unwrap_or(&me.first_name)
    );

    match config.webhook_endpoint() {
        Some(url) => bot
            .sync_webhook(&url, config.webhook_secret.as_deref())
            .await
            .context("Failed to register webhook")?,
        None => warn!("WEBHOOK_URL is not set; Telegram will not deliver updates"),
    }

    let store = Arc::new(QuizStore::new());
    let handler = Arc::new(CommandHandler::new(Arc::clone(&store), settings.clone()));
    let dispatcher = Dispatcher::new(Arc::clone(&bot), handler, &settings)
        .with_bot_username(me.username.clone());
    let dispatcher = Arc::new(dispatcher);

    // Webhook -> dispatcher queue
    let (update_tx, update_rx) = mpsc::channel(settings.update_queue_size);
    let dispatcher_handle = tokio::spawn(dispatcher.run(update_rx));

    let state = Arc::new(AppState {
        store,
        updates: update_tx,
        webhook_secret: config.webhook_secret.clone(),
        bot: Some(Arc::clone(&bot)),
        max_body_bytes: usize::try_from(settings.max_upload_bytes).unwrap_or(usize::MAX),
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Listening on {}", addr);
    info!("Bot is running. Use Ctrl+C to stop.");

    axum::serve(listener, server::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    // The router owned the queue sender, so the dispatcher stops on its own.
    info!("Shutting down...");
    let _ = dispatcher_handle.await;

    Ok(())
}

/// Initializes the logging subsystem.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Resolves on Ctrl+C.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down..."),
        Err(e) => {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

/// Generates an example quiz file.
fn generate_example_quiz() -> Result<()> {
    const PATH: &str = "quiz.example.json";

    Quiz::example()
        .save_to_file(PATH)
        .with_context(|| format!("Failed to write {PATH}"))?;

    println!("✓ Example quiz written to: {PATH}");
    println!("\nTo use this bot:");
    println!("1. Create a .env file with BOT_API_KEY and WEBHOOK_URL");
    println!("2. Run: quiz_bot");
    println!("3. Send /start to your bot, then upload {PATH} as a document");

    Ok(())
}
