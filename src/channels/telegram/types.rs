//! Telegram Bot API request/response types

use serde::{Deserialize, Serialize};

use crate::channels::IncomingMessage;

/// Telegram Bot API host
pub const API_BASE: &str = "https://api.telegram.org";

/// Incoming update, as delivered by webhook or `getUpdates`
///
/// Only the fields the bot reacts to are modelled; everything else is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    /// Absent in hand-built envelopes; such updates skip deduplication
    #[serde(default)]
    pub update_id: Option<i64>,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Message sender, also returned by `getMe`
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

impl Update {
    /// Convert to an [`IncomingMessage`]
    ///
    /// Returns `None` for non-message updates, messages without text and
    /// messages sent by bots.
    #[must_use]
    pub fn into_incoming(self) -> Option<IncomingMessage> {
        let message = self.message?;
        if message.from.as_ref().is_some_and(|u| u.is_bot) {
            return None;
        }

        let text = message.text?;
        if text.trim().is_empty() {
            return None;
        }

        Some(IncomingMessage::text(message.chat.id, text))
    }
}

/// Telegram sendMessage request
#[derive(Debug, Serialize)]
pub(crate) struct SendMessageRequest<'a> {
    pub chat_id: i64,
    pub text: &'a str,
}

/// Telegram sendChatAction request
#[derive(Debug, Serialize)]
pub(crate) struct SendChatActionRequest<'a> {
    pub chat_id: i64,
    pub action: &'a str,
}

/// Telegram setWebhook request
#[derive(Debug, Serialize)]
pub(crate) struct SetWebhookRequest<'a> {
    pub url: &'a str,
    pub allowed_updates: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_token: Option<&'a str>,
}

/// Telegram getUpdates request
#[derive(Debug, Serialize)]
pub(crate) struct GetUpdatesRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    pub timeout: u64,
    pub allowed_updates: &'a [&'a str],
}

/// Telegram API response wrapper
#[derive(Debug, Deserialize)]
pub struct TelegramResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Option<ResponseParameters>,
}

/// Extra error details, e.g. flood-control wait time
#[derive(Debug, Deserialize)]
pub struct ResponseParameters {
    #[serde(default)]
    pub retry_after: Option<u64>,
}
