//! Typed slice of the Telegram Bot API: the structs the bot actually
//! exchanges, the outbound `ChatApi` trait, and the reqwest client.

mod client;
pub mod types;

pub use client::TelegramClient;
pub use types::{
    CallbackQuery, Chat, ChatId, ChatKind, InlineKeyboardButton, InlineKeyboardMarkup, Message,
    MessageId, ParseMode, Update, User,
};

use async_trait::async_trait;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TelegramError>;

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("network error: {0}")]
    Network(String),

    #[error("telegram api error (code {code}): {description}")]
    Api { code: i64, description: String },
}

impl From<reqwest::Error> for TelegramError {
    fn from(err: reqwest::Error) -> Self {
        TelegramError::Network(err.to_string())
    }
}

/// Formatting and keyboard attachments for an outbound message.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub parse_mode: Option<ParseMode>,
    pub keyboard: Option<InlineKeyboardMarkup>,
}

impl SendOptions {
    pub fn html() -> Self {
        Self {
            parse_mode: Some(ParseMode::Html),
            keyboard: None,
        }
    }

    pub fn markdown() -> Self {
        Self {
            parse_mode: Some(ParseMode::Markdown),
            keyboard: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: InlineKeyboardMarkup) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// The outbound channel. Implemented by `TelegramClient` in production and by
/// a recording double in tests.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Send a text message to a user or group chat.
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        opts: SendOptions,
    ) -> Result<Message>;

    /// Edit a previously sent message in place.
    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        opts: SendOptions,
    ) -> Result<()>;

    /// Answer a button-press callback, optionally with an alert toast.
    async fn answer_callback(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<()>;
}
