//! Raw Telegram Bot API calls

use serde::Serialize;
use serde::de::DeserializeOwned;
use secrecy::ExposeSecret;

use super::retry::{self, Disposition};
use super::types::{
    GetUpdatesRequest, SendChatActionRequest, SendMessageRequest, SetWebhookRequest,
    TelegramResponse, Update, User,
};
use crate::{Error, Result};

/// Update kinds the bot subscribes to
const ALLOWED_UPDATES: &[&str] = &["message"];

impl super::TelegramChannel {
    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.api_base,
            self.token.expose_secret()
        )
    }

    /// POST a Bot API method, retrying flood control and server errors
    async fn call<Req, Resp>(&self, method: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned + Send,
    {
        let url = self.method_url(method);
        let mut attempt = 0;

        loop {
            let response = match self.client.post(&url).json(request).send().await {
                Ok(response) => response,
                Err(e) if retry::is_transient(&e) && attempt < self.retry.max_retries => {
                    let wait = self.retry.delay(attempt, None);
                    tracing::warn!(method, attempt, error = %e.without_url(), ?wait, "Telegram request failed, retrying");
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                    continue;
                }
                Err(e) => {
                    return Err(Error::Channel(format!(
                        "Telegram {method} error: {}",
                        e.without_url()
                    )));
                }
            };

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| Error::Channel(format!("Telegram {method} read error: {}", e.without_url())))?;

            let parsed: Option<TelegramResponse<Resp>> = serde_json::from_str(&body).ok();

            if status.is_success() {
                let parsed = parsed.ok_or_else(|| {
                    Error::Channel(format!("Telegram {method} returned unparseable body"))
                })?;
                if parsed.ok
                    && let Some(result) = parsed.result
                {
                    return Ok(result);
                }
                return Err(Error::Channel(format!(
                    "Telegram {method} rejected: {}",
                    parsed.description.unwrap_or_default()
                )));
            }

            let retry_after = parsed
                .as_ref()
                .and_then(|p| p.parameters.as_ref())
                .and_then(|p| p.retry_after);
            let description = parsed
                .and_then(|p| p.description)
                .unwrap_or(body);

            match retry::classify(status, retry_after) {
                Disposition::Retry(after) if attempt < self.retry.max_retries => {
                    let wait = self.retry.delay(attempt, after);
                    tracing::warn!(method, attempt, %status, ?wait, "Telegram API busy, retrying");
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                _ => {
                    return Err(Error::Channel(format!(
                        "Telegram {method} error: {status} - {description}"
                    )));
                }
            }
        }
    }

    /// Send a plain-text message
    ///
    /// # Errors
    ///
    /// Returns error if the API rejects the message after retries
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let request = SendMessageRequest { chat_id, text };

        let _: serde_json::Value = self.call("sendMessage", &request).await?;
        tracing::debug!(chat_id, "Telegram message sent");
        Ok(())
    }

    /// Send a chat action such as `typing`
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn send_chat_action(&self, chat_id: i64, action: &str) -> Result<()> {
        let request = SendChatActionRequest { chat_id, action };
        let _: bool = self.call("sendChatAction", &request).await?;
        Ok(())
    }

    /// Set webhook URL for receiving updates
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn set_webhook(&self, url: &str, secret_token: Option<&str>) -> Result<()> {
        let request = SetWebhookRequest {
            url,
            allowed_updates: ALLOWED_UPDATES,
            secret_token,
        };

        let _: bool = self.call("setWebhook", &request).await?;
        tracing::info!(url, "Telegram webhook set");
        Ok(())
    }

    /// Delete webhook (switch to polling mode)
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn delete_webhook(&self) -> Result<()> {
        let _: bool = self.call("deleteWebhook", &serde_json::json!({})).await?;
        tracing::info!("Telegram webhook deleted");
        Ok(())
    }

    /// Fetch the bot's own account, verifying the token
    ///
    /// # Errors
    ///
    /// Returns error if the token is invalid or the API is unreachable
    pub async fn get_me(&self) -> Result<User> {
        self.call("getMe", &serde_json::json!({})).await
    }

    /// Long-poll for updates after `offset`
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout_secs,
            allowed_updates: ALLOWED_UPDATES,
        };
        self.call("getUpdates", &request).await
    }
}
