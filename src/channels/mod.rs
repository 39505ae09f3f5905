//! Message delivery channels
//!
//! Delivery is a collaborator: the agent only needs to send text and show a
//! typing indicator. Telegram is the production adapter; [`LogChannel`] stands
//! in when no bot token is configured.

pub mod telegram;

use async_trait::async_trait;

pub use telegram::TelegramChannel;

use crate::Result;
use crate::session::ChatId;

/// A user message received from a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub chat_id: ChatId,
    pub text: String,
}

impl IncomingMessage {
    #[must_use]
    pub fn text(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
        }
    }
}

/// A message to deliver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub chat_id: ChatId,
    /// Plain text
    pub content: String,
}

impl OutgoingMessage {
    /// Create a simple `text` message
    #[must_use]
    pub fn text(chat_id: ChatId, content: impl Into<String>) -> Self {
        Self {
            chat_id,
            content: content.into(),
        }
    }
}

/// Outbound side of a messaging transport
#[async_trait]
pub trait Channel: Send + Sync {
    /// Get the channel name
    fn name(&self) -> &'static str;

    /// Send a message
    ///
    /// # Errors
    ///
    /// Returns error if the transport rejects or cannot deliver the message
    async fn send(&self, message: OutgoingMessage) -> Result<()>;

    /// Send typing indicator to show the bot is composing
    ///
    /// Default implementation is a no-op for channels that don't support typing
    ///
    /// # Errors
    ///
    /// Returns error if the transport call fails
    async fn send_typing(&self, _chat_id: ChatId) -> Result<()> {
        Ok(())
    }
}

/// Channel that only logs outbound messages
///
/// Used for local development without a bot token.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogChannel;

#[async_trait]
impl Channel for LogChannel {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, message: OutgoingMessage) -> Result<()> {
        tracing::info!(
            chat_id = message.chat_id,
            content = %message.content,
            "outbound message"
        );
        Ok(())
    }
}
