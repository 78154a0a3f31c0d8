use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::types::{
    ChatId, InlineKeyboardMarkup, Message, MessageId, ParseMode, Update, User,
};
use super::{ChatApi, Result, SendOptions, TelegramError};

const BASE_URL: &str = "https://api.telegram.org";

pub struct TelegramClient {
    client: reqwest::Client,
    token: String,
}

#[derive(Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
}

fn into_result<T>(envelope: ApiEnvelope<T>) -> Result<T> {
    if !envelope.ok {
        return Err(TelegramError::Api {
            code: envelope.error_code.unwrap_or(0),
            description: envelope
                .description
                .unwrap_or_else(|| "unknown error".to_string()),
        });
    }
    envelope.result.ok_or_else(|| TelegramError::Api {
        code: 0,
        description: "ok response carried no result".to_string(),
    })
}

#[derive(Serialize)]
struct SendMessagePayload<'a> {
    chat_id: ChatId,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Serialize)]
struct EditMessagePayload<'a> {
    chat_id: ChatId,
    message_id: MessageId,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<ParseMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Serialize)]
struct AnswerCallbackPayload<'a> {
    callback_query_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    show_alert: bool,
}

#[derive(Serialize)]
struct GetUpdatesPayload {
    offset: i64,
    timeout: u64,
}

impl TelegramClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.into(),
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{BASE_URL}/bot{}/{method}", self.token)
    }

    async fn call<P, T>(&self, method: &str, payload: &P) -> Result<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self
            .client
            .post(self.url(method))
            .json(payload)
            .send()
            .await?;
        let envelope: ApiEnvelope<T> = resp.json().await?;
        into_result(envelope)
    }

    /// The bot's own account, used for deep links and `/cmd@bot` filtering.
    pub async fn get_me(&self) -> Result<User> {
        self.call("getMe", &serde_json::json!({})).await
    }

    /// Long poll for updates. Blocks server-side up to `timeout_secs`.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        let resp = self
            .client
            .post(self.url("getUpdates"))
            .timeout(Duration::from_secs(timeout_secs + 10))
            .json(&GetUpdatesPayload {
                offset,
                timeout: timeout_secs,
            })
            .send()
            .await?;
        let envelope: ApiEnvelope<Vec<Update>> = resp.json().await?;
        into_result(envelope)
    }
}

#[async_trait]
impl ChatApi for TelegramClient {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        opts: SendOptions,
    ) -> Result<Message> {
        tracing::debug!(chat_id, "sendMessage");
        self.call(
            "sendMessage",
            &SendMessagePayload {
                chat_id,
                text,
                parse_mode: opts.parse_mode,
                reply_markup: opts.keyboard,
            },
        )
        .await
    }

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        opts: SendOptions,
    ) -> Result<()> {
        tracing::debug!(chat_id, message_id, "editMessageText");
        // Returns the edited message for bot-sent messages, `true` otherwise.
        let _: serde_json::Value = self
            .call(
                "editMessageText",
                &EditMessagePayload {
                    chat_id,
                    message_id,
                    text,
                    parse_mode: opts.parse_mode,
                    reply_markup: opts.keyboard,
                },
            )
            .await?;
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<()> {
        tracing::debug!(callback_query_id, show_alert, "answerCallbackQuery");
        let _: serde_json::Value = self
            .call(
                "answerCallbackQuery",
                &AnswerCallbackPayload {
                    callback_query_id,
                    text,
                    show_alert,
                },
            )
            .await?;
        Ok(())
    }
}
