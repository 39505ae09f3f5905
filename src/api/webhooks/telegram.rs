//! Telegram webhook handler
//!
//! Telegram redelivers any update that is not acknowledged with a 2xx, so the
//! handler answers `200 {"ok": true}` for everything it accepts, including
//! payloads it cannot use, and processes messages in a background task.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use secrecy::ExposeSecret;
use serde::Serialize;

use crate::api::ApiState;
use crate::channels::telegram::Update;

/// Header carrying the secret registered with `setWebhook`
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Webhook response
#[derive(Serialize)]
pub struct WebhookResponse {
    pub ok: bool,
}

fn ack() -> (StatusCode, Json<WebhookResponse>) {
    (StatusCode::OK, Json(WebhookResponse { ok: true }))
}

/// Handle incoming Telegram update
pub async fn handle_update(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<WebhookResponse>) {
    if let Some(expected) = &state.webhook_secret {
        let provided = headers
            .get(SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if provided != expected.expose_secret() {
            tracing::warn!("Telegram webhook call with bad secret token");
            return (StatusCode::UNAUTHORIZED, Json(WebhookResponse { ok: false }));
        }
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            tracing::debug!(error = %e, "dropping malformed Telegram update");
            return ack();
        }
    };

    if let Some(update_id) = update.update_id
        && state.is_duplicate_update(update_id)
    {
        tracing::debug!(update_id, "duplicate Telegram update");
        return ack();
    }

    let Some(message) = update.into_incoming() else {
        return ack();
    };

    tracing::debug!(chat_id = message.chat_id, "Telegram message received");

    let runner = Arc::clone(&state.runner);
    tokio::spawn(async move {
        let chat_id = message.chat_id;
        let outcome = runner.handle_inbound(message).await;
        tracing::debug!(chat_id, ?outcome, "Telegram message handled");
    });

    ack()
}
