//! Recording `ChatApi` double for handler tests. Captures every outbound
//! message for assertions; configured chat ids fail sends the way a user who
//! blocked the bot does.

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::telegram::{
    Chat, ChatApi, ChatId, ChatKind, Message, MessageId, Result, SendOptions, TelegramError,
};

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub chat_id: ChatId,
    pub text: String,
    pub opts: SendOptions,
}

#[derive(Debug, Clone)]
pub struct EditedMessage {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub text: String,
    pub opts: SendOptions,
}

#[derive(Debug, Clone)]
pub struct CallbackAnswer {
    pub id: String,
    pub text: Option<String>,
    pub show_alert: bool,
}

#[derive(Default)]
pub struct RecordingChat {
    sent: Mutex<Vec<SentMessage>>,
    edits: Mutex<Vec<EditedMessage>>,
    answers: Mutex<Vec<CallbackAnswer>>,
    blocked: HashSet<ChatId>,
    next_message_id: AtomicI64,
}

impl RecordingChat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blocked(chats: impl IntoIterator<Item = ChatId>) -> Self {
        Self {
            blocked: chats.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, chat_id: ChatId) -> Vec<SentMessage> {
        self.sent()
            .into_iter()
            .filter(|m| m.chat_id == chat_id)
            .collect()
    }

    pub fn edits(&self) -> Vec<EditedMessage> {
        self.edits.lock().unwrap().clone()
    }

    pub fn answers(&self) -> Vec<CallbackAnswer> {
        self.answers.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatApi for RecordingChat {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        opts: SendOptions,
    ) -> Result<Message> {
        if self.blocked.contains(&chat_id) {
            return Err(TelegramError::Api {
                code: 403,
                description: "Forbidden: bot was blocked by the user".to_string(),
            });
        }
        let message_id = self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.sent.lock().unwrap().push(SentMessage {
            chat_id,
            text: text.to_string(),
            opts,
        });
        Ok(Message {
            message_id,
            from: None,
            chat: Chat {
                id: chat_id,
                kind: ChatKind::Private,
            },
            text: Some(text.to_string()),
            new_chat_members: Vec::new(),
        })
    }

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        opts: SendOptions,
    ) -> Result<()> {
        self.edits.lock().unwrap().push(EditedMessage {
            chat_id,
            message_id,
            text: text.to_string(),
            opts,
        });
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<()> {
        self.answers.lock().unwrap().push(CallbackAnswer {
            id: callback_query_id.to_string(),
            text: text.map(str::to_string),
            show_alert,
        });
        Ok(())
    }
}
