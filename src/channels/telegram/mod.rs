//! Telegram channel adapter
//!
//! Receives updates by webhook (see `api::webhooks::telegram`) or long polling
//! and sends through the Bot API.

mod api;
pub mod dedup;
pub mod polling;
pub mod retry;
pub mod types;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::SecretString;

use super::{Channel, OutgoingMessage};
use crate::Result;
use crate::session::ChatId;

pub use dedup::UpdateDedup;
pub use retry::RetryPolicy;
pub use types::Update;

/// Telegram channel adapter
#[derive(Clone)]
pub struct TelegramChannel {
    token: SecretString,
    client: Client,
    api_base: String,
    retry: RetryPolicy,
}

impl std::fmt::Debug for TelegramChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramChannel")
            .field("api_base", &self.api_base)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl TelegramChannel {
    /// Create a new Telegram channel adapter
    #[must_use]
    pub fn new(token: SecretString) -> Self {
        Self {
            token,
            client: Client::new(),
            api_base: types::API_BASE.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    /// Point the adapter at another Bot API server
    #[must_use]
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, message: OutgoingMessage) -> Result<()> {
        self.send_message(message.chat_id, &message.content).await
    }

    async fn send_typing(&self, chat_id: ChatId) -> Result<()> {
        self.send_chat_action(chat_id, "typing").await?;
        tracing::debug!(chat_id, "Telegram typing indicator sent");
        Ok(())
    }
}
