//! Telegram polling mode: `getUpdates` loop feeding an mpsc channel

use std::time::Duration;

use tokio::sync::mpsc;

use super::dedup::UpdateDedup;
use crate::channels::IncomingMessage;

/// Long-poll timeout passed to `getUpdates`
const LONG_POLL_SECS: u64 = 30;

impl super::TelegramChannel {
    /// Spawn a background task that long-polls `getUpdates`
    ///
    /// Received text messages are forwarded into `tx`. Any webhook is deleted
    /// first since Telegram refuses `getUpdates` while one is set. The task
    /// ends when the receiver is dropped.
    #[must_use]
    pub fn start_polling(
        &self,
        tx: mpsc::Sender<IncomingMessage>,
        error_backoff: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let channel = self.clone();
        tokio::spawn(async move { channel.polling_loop(tx, error_backoff).await })
    }

    async fn polling_loop(&self, tx: mpsc::Sender<IncomingMessage>, error_backoff: Duration) {
        if let Err(e) = self.delete_webhook().await {
            tracing::warn!(error = %e, "failed to delete Telegram webhook before polling");
        }

        let mut offset: Option<i64> = None;
        let mut dedup = UpdateDedup::default();
        tracing::info!("Telegram polling started");

        loop {
            let updates = match self.get_updates(offset, LONG_POLL_SECS).await {
                Ok(updates) => updates,
                Err(e) => {
                    tracing::warn!(error = %e, "Telegram getUpdates error");
                    tokio::time::sleep(error_backoff).await;
                    continue;
                }
            };

            for update in updates {
                if let Some(update_id) = update.update_id {
                    offset = Some(update_id + 1);
                    if dedup.is_duplicate(update_id) {
                        continue;
                    }
                }

                let Some(message) = update.into_incoming() else {
                    continue;
                };

                if tx.send(message).await.is_err() {
                    tracing::info!("update receiver closed, stopping Telegram polling");
                    return;
                }
            }
        }
    }
}
