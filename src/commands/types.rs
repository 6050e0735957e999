//! Command types and definitions.

use std::fmt;

use crate::quiz::QuizId;
use crate::telegram::{ChatId, InlineKeyboardMarkup, ParseMode, UserId};

/// Available bot commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    /// Show the welcome text with the quiz file format.
    Start,

    /// Same as `Start`.
    Help,

    /// List quizzes created by the sender.
    MyQuizzes,

    /// List every quiz with a button to take it.
    AllQuizzes,

    /// Leave the running quiz.
    Quit,

    /// Cancel the running quiz.
    Cancel,
}

impl BotCommand {
    /// Every command, in the order shown to users.
    pub const ALL: [Self; 6] = [
        Self::Start,
        Self::Help,
        Self::MyQuizzes,
        Self::AllQuizzes,
        Self::Quit,
        Self::Cancel,
    ];

    /// Parses a command from a message text.
    ///
    /// Accepts an optional `@botname` suffix; when `bot_username` is known
    /// the suffix must name this bot. Returns `None` if the message is not
    /// a known command.
    #[must_use]
    pub fn parse(text: &str, bot_username: Option<&str>) -> Option<Self> {
        let text = text.trim();
        let rest = text.strip_prefix('/')?;

        let word = rest.split_whitespace().next()?;
        let (cmd, mention) = match word.split_once('@') {
            Some((cmd, mention)) => (cmd, Some(mention)),
            None => (word, None),
        };

        if let (Some(mention), Some(username)) = (mention, bot_username)
            && !mention.eq_ignore_ascii_case(username)
        {
            return None;
        }

        match cmd.to_lowercase().as_str() {
            "start" => Some(Self::Start),
            "help" => Some(Self::Help),
            "myquizzes" => Some(Self::MyQuizzes),
            "allquizzes" => Some(Self::AllQuizzes),
            "quit" => Some(Self::Quit),
            "cancel" => Some(Self::Cancel),
            _ => None,
        }
    }

    /// Returns the command name without the leading slash.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::MyQuizzes => "myquizzes",
            Self::AllQuizzes => "allquizzes",
            Self::Quit => "quit",
            Self::Cancel => "cancel",
        }
    }

    /// Returns the command description for help.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Start => "Show the welcome message",
            Self::Help => "Show how to create a quiz",
            Self::MyQuizzes => "See quizzes you've created",
            Self::AllQuizzes => "Browse all quizzes and take one",
            Self::Quit => "Quit the quiz you are taking",
            Self::Cancel => "Cancel the quiz you are taking",
        }
    }
}

impl fmt::Display for BotCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.name())
    }
}

/// Action encoded in an inline button's callback data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    /// `takequiz_{id}`
    TakeQuiz(QuizId),

    /// `answer_{generation}_{option}`, where `generation` identifies the
    /// presentation of the question the button belongs to.
    Answer { generation: u64, option: usize },

    /// `restart_quiz`
    Restart,
}

impl CallbackAction {
    /// Parses callback data. Returns `None` for unknown or malformed data.
    #[must_use]
    pub fn parse(data: &str) -> Option<Self> {
        if data == "restart_quiz" {
            return Some(Self::Restart);
        }
        if let Some(id) = data.strip_prefix("takequiz_") {
            return id.parse().ok().map(Self::TakeQuiz);
        }
        let (generation, option) = data.strip_prefix("answer_")?.split_once('_')?;
        Some(Self::Answer {
            generation: generation.parse().ok()?,
            option: option.parse().ok()?,
        })
    }
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TakeQuiz(id) => write!(f, "takequiz_{id}"),
            Self::Answer { generation, option } => write!(f, "answer_{generation}_{option}"),
            Self::Restart => f.write_str("restart_quiz"),
        }
    }
}

/// One outgoing message.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text {
        text: String,
        parse_mode: Option<ParseMode>,
        keyboard: Option<InlineKeyboardMarkup>,
    },
    Animation {
        url: String,
    },
}

impl Reply {
    /// Plain text reply.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            parse_mode: None,
            keyboard: None,
        }
    }

    /// HTML-formatted reply.
    #[must_use]
    pub fn html(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            parse_mode: Some(ParseMode::Html),
            keyboard: None,
        }
    }

    /// Attaches an inline keyboard; no effect on animations.
    #[must_use]
    pub fn with_keyboard(mut self, markup: InlineKeyboardMarkup) -> Self {
        if let Self::Text { keyboard, .. } = &mut self {
            *keyboard = Some(markup);
        }
        self
    }

    #[must_use]
    pub fn animation(url: impl Into<String>) -> Self {
        Self::Animation { url: url.into() }
    }

    /// Text of the reply, if it has any.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text, .. } => Some(text),
            Self::Animation { .. } => None,
        }
    }
}

/// A question timer to arm after the replies are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionTimer {
    pub user: UserId,
    pub generation: u64,
}

/// Result of handling a command, upload, callback or timeout.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Chat the replies go to.
    pub chat_id: ChatId,

    /// Messages to send, in order.
    pub replies: Vec<Reply>,

    /// Timer for the question presented by these replies.
    pub timer: Option<QuestionTimer>,

    /// Short text for the callback-query toast.
    pub notice: Option<String>,
}

impl CommandResult {
    /// Creates an empty result for `chat_id`.
    #[must_use]
    pub const fn new(chat_id: ChatId) -> Self {
        Self {
            chat_id,
            replies: Vec::new(),
            timer: None,
            notice: None,
        }
    }

    /// Creates a result holding one plain text reply.
    #[must_use]
    pub fn text(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self::new(chat_id).with_reply(Reply::text(text))
    }

    /// Creates a result holding only a callback notice.
    #[must_use]
    pub fn notice(chat_id: ChatId, notice: impl Into<String>) -> Self {
        Self {
            notice: Some(notice.into()),
            ..Self::new(chat_id)
        }
    }

    #[must_use]
    pub fn with_reply(mut self, reply: Reply) -> Self {
        self.replies.push(reply);
        self
    }

    #[must_use]
    pub const fn with_timer(mut self, timer: QuestionTimer) -> Self {
        self.timer = Some(timer);
        self
    }

    /// Appends the replies and timer of `other`.
    pub fn extend(&mut self, other: Self) {
        self.replies.extend(other.replies);
        if other.timer.is_some() {
            self.timer = other.timer;
        }
        if other.notice.is_some() {
            self.notice = other.notice;
        }
    }

    /// Texts of all text replies, in order.
    #[must_use]
    pub fn texts(&self) -> Vec<&str> {
        self.replies.iter().filter_map(Reply::as_text).collect()
    }
}
