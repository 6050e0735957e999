//! Command handler implementation.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::types::{BotCommand, CallbackAction, CommandResult, QuestionTimer, Reply};
use crate::config::BotSettings;
use crate::quiz::{
    MIN_OPTIONS, Quiz, QuizId, QuizQuestion, QuizStore, StoredQuiz, ValidationError,
};
use crate::session::{AnswerOutcome, Leaderboard, QuizSession};
use crate::telegram::{
    ChatId, Document, InlineKeyboardButton, InlineKeyboardMarkup, User, UserId,
};

/// Animation sent after a correct answer.
pub const CORRECT_ANIMATION_URL: &str =
    "https://media.giphy.com/media/26gN1h5bQPSF7vsoI/giphy.gif";

/// Animation sent after a wrong answer.
pub const WRONG_ANIMATION_URL: &str =
    "https://media.giphy.com/media/l3vR85PnGsBwu1PFK/giphy.gif";

const QUIT_TEXT: &str = "❌ You have quit the quiz. Type /start to play again.";
const TIMEOUT_TEXT: &str = "⏳ Time's up! Moving to the next question.";

/// Longest quiz name shown on a button.
const MAX_BUTTON_NAME: usize = 40;

/// A running session together with the name shown on the leaderboard.
#[derive(Debug)]
struct Player {
    name: String,
    session: QuizSession,
}

/// Handles bot commands, uploads and button presses.
///
/// Holds every session and leaderboard. It never talks to Telegram itself:
/// each call returns a [`CommandResult`] for the dispatcher to deliver.
pub struct CommandHandler {
    /// Registry of uploaded quizzes.
    store: Arc<QuizStore>,

    /// Running sessions, one per user.
    sessions: RwLock<HashMap<UserId, Player>>,

    /// Leaderboards, one per quiz.
    leaderboards: RwLock<HashMap<QuizId, Leaderboard>>,

    settings: BotSettings,
}

impl CommandHandler {
    /// Creates a new command handler.
    #[must_use]
    pub fn new(store: Arc<QuizStore>, settings: BotSettings) -> Self {
        Self {
            store,
            sessions: RwLock::new(HashMap::new()),
            leaderboards: RwLock::new(HashMap::new()),
            settings,
        }
    }

    /// Tries to parse and execute a command from a message.
    ///
    /// Returns `None` if the message is not a command.
    pub async fn try_handle(
        &self,
        text: &str,
        bot_username: Option<&str>,
        user: &User,
        chat: ChatId,
    ) -> Option<CommandResult> {
        let command = BotCommand::parse(text, bot_username)?;

        debug!("Handling command {} from user {}", command, user.id);
        Some(self.execute(command, user, chat).await)
    }

    /// Executes a parsed command.
    pub async fn execute(&self, command: BotCommand, user: &User, chat: ChatId) -> CommandResult {
        match command {
            BotCommand::Start | BotCommand::Help => {
                CommandResult::new(chat).with_reply(Reply::html(welcome_text()))
            }
            BotCommand::MyQuizzes => self.handle_my_quizzes(user.id, chat).await,
            BotCommand::AllQuizzes => self.handle_all_quizzes(chat).await,
            BotCommand::Quit => {
                if self.end_session(user.id).await {
                    info!("User {} quit their quiz", user.id);
                }
                CommandResult::text(chat, QUIT_TEXT)
            }
            BotCommand::Cancel => {
                if self.end_session(user.id).await {
                    info!("User {} cancelled their quiz", user.id);
                }
                CommandResult::text(chat, "Quiz cancelled.")
            }
        }
    }

    async fn handle_my_quizzes(&self, user: UserId, chat: ChatId) -> CommandResult {
        let quizzes = self.store.by_creator(user).await;

        if quizzes.is_empty() {
            return CommandResult::text(chat, "You haven't created any quizzes yet.");
        }

        let mut lines = vec!["Your quizzes:".to_owned()];
        lines.extend(quizzes.iter().map(|q| format!("ID: {} - {}", q.id, q.name)));

        CommandResult::text(chat, lines.join("\n"))
    }

    async fn handle_all_quizzes(&self, chat: ChatId) -> CommandResult {
        let quizzes = self.store.all().await;

        if quizzes.is_empty() {
            return CommandResult::text(chat, "No quizzes available yet.");
        }

        let buttons = quizzes.iter().map(|q| {
            InlineKeyboardButton::callback(
                format!("{} (ID: {})", truncate(&q.name, MAX_BUTTON_NAME), q.id),
                CallbackAction::TakeQuiz(q.id).to_string(),
            )
        });

        let keyboard = InlineKeyboardMarkup::single_column(buttons);
        CommandResult::new(chat)
            .with_reply(Reply::text("Available quizzes:").with_keyboard(keyboard))
    }

    /// Checks an uploaded document before it is downloaded.
    ///
    /// Returns the file name on success, or the reply explaining the rejection.
    pub fn check_document<'a>(
        &self,
        chat: ChatId,
        document: &'a Document,
    ) -> Result<&'a str, CommandResult> {
        let Some(file_name) = document
            .file_name
            .as_deref()
            .filter(|name| is_quiz_file(name))
        else {
            return Err(CommandResult::text(
                chat,
                "Please upload a file with a .json extension.",
            ));
        };

        if let Some(size) = document.file_size
            && size > self.settings.max_upload_bytes
        {
            return Err(CommandResult::text(
                chat,
                format!(
                    "The file is too large ({}). The limit is {}.",
                    format_size(size),
                    format_size(self.settings.max_upload_bytes)
                ),
            ));
        }

        Ok(file_name)
    }

    /// Creates a quiz from the contents of an uploaded document.
    pub async fn handle_upload(
        &self,
        user: &User,
        chat: ChatId,
        file_name: &str,
        bytes: &[u8],
    ) -> CommandResult {
        match Quiz::ingest_slice(bytes) {
            Ok(quiz) => {
                let name = quiz_name_from_file(file_name);
                let stored = self.store.insert(name, Some(user.id), quiz).await;
                quiz_created(chat, &stored)
            }
            Err(ValidationError::NotAnArray { .. }) => {
                debug!("Upload '{}' from user {} is not an array", file_name, user.id);
                CommandResult::text(chat, "The JSON must be a list of questions.")
            }
            Err(e) => {
                warn!("Rejected quiz upload '{}' from user {}: {}", file_name, user.id, e);
                CommandResult::text(chat, format!("Could not create the quiz: {e}"))
            }
        }
    }

    /// Handles an inline button press.
    pub async fn handle_callback(&self, user: &User, chat: ChatId, data: &str) -> CommandResult {
        let Some(action) = CallbackAction::parse(data) else {
            warn!("Unknown callback data from user {}: {:?}", user.id, data);
            return CommandResult::notice(chat, "Unknown action.");
        };

        debug!("Handling callback {} from user {}", action, user.id);
        match action {
            CallbackAction::TakeQuiz(id) => match self.store.get(id).await {
                Some(quiz) => self.start_quiz(user, chat, quiz).await,
                None => CommandResult::text(chat, "Quiz not found."),
            },
            CallbackAction::Answer { generation, option } => {
                self.handle_answer(user, chat, generation, option).await
            }
            CallbackAction::Restart => self.handle_restart(user, chat).await,
        }
    }

    /// Handles a fired question timer.
    ///
    /// Returns `None` when the question was answered or replaced meanwhile.
    pub async fn handle_timeout(&self, user: UserId, generation: u64) -> Option<CommandResult> {
        let mut sessions = self.sessions.write().await;
        let player = sessions.get_mut(&user)?;

        if !player.session.expire(generation) {
            return None;
        }

        debug!("Question timed out for user {}", user);
        let mut result = CommandResult::text(player.session.chat_id(), TIMEOUT_TEXT);
        result.extend(self.next_step(user, player).await);
        Some(result)
    }

    async fn start_quiz(&self, user: &User, chat: ChatId, quiz: Arc<StoredQuiz>) -> CommandResult {
        info!("User {} started quiz {} ('{}')", user.id, quiz.id, quiz.name);

        let mut player = Player {
            name: user.first_name.clone(),
            session: QuizSession::new(quiz, chat),
        };

        let mut sessions = self.sessions.write().await;
        let result = self.next_step(user.id, &mut player).await;
        sessions.insert(user.id, player);
        result
    }

    async fn handle_answer(
        &self,
        user: &User,
        chat: ChatId,
        generation: u64,
        option: usize,
    ) -> CommandResult {
        let mut sessions = self.sessions.write().await;
        let Some(player) = sessions.get_mut(&user.id) else {
            return CommandResult::notice(
                chat,
                "You are not taking a quiz. Use /allquizzes to pick one.",
            );
        };

        let chat = player.session.chat_id();
        let mut result = match player.session.answer(generation, option) {
            AnswerOutcome::Correct { question, chosen } => CommandResult::new(chat)
                .with_reply(Reply::animation(CORRECT_ANIMATION_URL))
                .with_reply(Reply::html(format!(
                    "✅ Correct! 🎉\n\n🎯 <b>{}</b>\n✅ {}",
                    html_escape(&question),
                    html_escape(&chosen)
                ))),
            AnswerOutcome::Wrong { correct } => CommandResult::new(chat)
                .with_reply(Reply::animation(WRONG_ANIMATION_URL))
                .with_reply(Reply::text(format!(
                    "❌ Wrong! The correct answer was:\n\n✅ {correct}"
                ))),
            AnswerOutcome::Stale => {
                debug!("Ignoring stale answer from user {}", user.id);
                return CommandResult::notice(chat, "That question is already over.");
            }
            AnswerOutcome::Finished => {
                return CommandResult::notice(
                    chat,
                    "This quiz is finished. Press Restart Quiz to play again.",
                );
            }
            AnswerOutcome::InvalidOption => return CommandResult::notice(chat, "Unknown option."),
        };

        result.extend(self.next_step(user.id, player).await);
        result
    }

    async fn handle_restart(&self, user: &User, chat: ChatId) -> CommandResult {
        let mut sessions = self.sessions.write().await;
        let Some(player) = sessions.get_mut(&user.id) else {
            return CommandResult::text(
                chat,
                "There is no quiz to restart. Use /allquizzes to pick one.",
            );
        };

        info!("User {} restarted quiz {}", user.id, player.session.quiz().id);
        player.session.restart();
        self.next_step(user.id, player).await
    }

    /// Presents the current question, or the results once none is left.
    async fn next_step(&self, user: UserId, player: &mut Player) -> CommandResult {
        let chat = player.session.chat_id();
        let index = player.session.current_index();
        let total = player.session.total();

        if let Some((generation, question)) = player.session.present() {
            let timeout = self.settings.question_timeout_secs;
            let reply = question_reply(index, total, generation, question, timeout);
            return CommandResult::new(chat)
                .with_reply(reply)
                .with_timer(QuestionTimer { user, generation });
        }

        self.finish(user, player).await
    }

    async fn finish(&self, user: UserId, player: &Player) -> CommandResult {
        let session = &player.session;
        let quiz = session.quiz();
        let score = session.score();
        let total = session.total();

        let mut leaderboards = self.leaderboards.write().await;
        let board = leaderboards.entry(quiz.id).or_default();
        board.record(user, &player.name, score, total);

        info!("User {} completed quiz {} with {}/{}", user, quiz.id, score, total);

        let ranking: Vec<String> = board
            .top(self.settings.leaderboard_size)
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                format!(
                    "{}. {} - {}/{} 🎯",
                    i + 1,
                    html_escape(&entry.name),
                    entry.score,
                    entry.total
                )
            })
            .collect();

        let text = format!(
            "🎉 <b>Quiz Completed!</b>\nYour score: {score}/{total}\n\n\
             🏅 <b>Leaderboard:</b>\n{}",
            ranking.join("\n")
        );
        let restart = InlineKeyboardMarkup::single_column([InlineKeyboardButton::callback(
            "Restart Quiz",
            CallbackAction::Restart.to_string(),
        )]);

        CommandResult::new(session.chat_id()).with_reply(Reply::html(text).with_keyboard(restart))
    }

    /// Removes the user's session. Returns `true` if there was one.
    pub async fn end_session(&self, user: UserId) -> bool {
        self.sessions.write().await.remove(&user).is_some()
    }
}

impl std::fmt::Debug for CommandHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandler")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Reply announcing a new quiz with a button to start it.
#[must_use]
pub fn quiz_created(chat: ChatId, quiz: &StoredQuiz) -> CommandResult {
    let start = InlineKeyboardMarkup::single_column([InlineKeyboardButton::callback(
        "Start Quiz",
        CallbackAction::TakeQuiz(quiz.id).to_string(),
    )]);

    CommandResult::new(chat).with_reply(
        Reply::text(format!(
            "Quiz '{}' created successfully!\nPress the button below to start.",
            quiz.name
        ))
        .with_keyboard(start),
    )
}

fn question_reply(
    index: usize,
    total: usize,
    generation: u64,
    question: &QuizQuestion,
    timeout_secs: u64,
) -> Reply {
    let buttons = question.options.iter().enumerate().map(|(option, text)| {
        InlineKeyboardButton::callback(
            text.clone(),
            CallbackAction::Answer { generation, option }.to_string(),
        )
    });

    Reply::text(format!(
        "Question {}/{} ({} to answer)\n\n{}",
        index + 1,
        total,
        format_duration(timeout_secs),
        question.question
    ))
    .with_keyboard(InlineKeyboardMarkup::single_column(buttons))
}

fn welcome_text() -> String {
    let example = Quiz::example().to_json_pretty().unwrap_or_default();
    let commands: Vec<String> = BotCommand::ALL
        .iter()
        .map(|command| format!("{command} - {}", command.description()))
        .collect();

    format!(
        "Welcome to the Quiz Bot!\n\n\
         • To create a quiz, simply upload a JSON file containing your questions.\n   \
         The JSON must be a list of questions. Each question should follow this format:\n\n\
         <pre><code class=\"language-json\">{}</code></pre>\n\n\
         <b>Explanation of JSON Structure:</b>\n\
         • <code>question</code>: The question text (or scripture quote/note point).\n\
         • <code>options</code>: An array of at least {MIN_OPTIONS} possible answers.\n\
         • <code>correct_option</code>: The index (starting from 0) of the correct answer \
         in the <code>options</code> array.\n\n\
         <b>Commands:</b>\n{}",
        html_escape(&example),
        commands.join("\n"),
    )
}

/// Returns `true` for file names with a `.json` extension.
#[must_use]
pub fn is_quiz_file(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Quiz name derived from an upload's file name (the name without extension).
#[must_use]
pub fn quiz_name_from_file(file_name: &str) -> &str {
    file_name.rsplit_once('.').map_or(file_name, |(stem, _)| stem)
}

/// Escapes text for HTML parse mode.
fn html_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Truncates a string to a maximum length, adding "..." if truncated.
fn truncate(s: &str, max_len: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max_len {
        s.to_owned()
    } else {
        format!("{}...", chars[..max_len].iter().collect::<String>())
    }
}

/// Formats a duration in seconds to a human-readable string.
fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        let mins = secs / 60;
        let rest = secs % 60;
        if rest == 0 {
            format!("{mins}m")
        } else {
            format!("{mins}m {rest}s")
        }
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// Formats a byte count for upload-limit messages.
fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    if bytes < KIB {
        format!("{bytes} B")
    } else if bytes < KIB * KIB {
        format!("{} KiB", bytes / KIB)
    } else {
        format!("{} MiB", bytes / (KIB * KIB))
    }
}
