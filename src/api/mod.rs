//! HTTP API: Telegram webhook and health probes

pub mod health;
pub mod webhooks;

use std::sync::{Arc, Mutex, PoisonError};

use axum::Router;
use secrecy::SecretString;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::agent::ConversationRunner;
use crate::channels::telegram::UpdateDedup;
use crate::session::SessionStore;

/// Names of the configured collaborators, reported by `/ready`
#[derive(Debug, Clone, Default)]
pub struct Collaborators {
    /// Text generator backend, `None` when no API key is configured
    pub llm: Option<&'static str>,
    /// Delivery channel name
    pub channel: &'static str,
    /// Whether a declension service is configured
    pub inflection: bool,
}

/// Shared API state
pub struct ApiState {
    pub runner: Arc<ConversationRunner>,
    pub store: Arc<SessionStore>,
    /// Expected `X-Telegram-Bot-Api-Secret-Token`, if any
    pub webhook_secret: Option<SecretString>,
    pub collaborators: Collaborators,
    dedup: Mutex<UpdateDedup>,
}

impl std::fmt::Debug for ApiState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiState")
            .field("collaborators", &self.collaborators)
            .field("webhook_secret", &self.webhook_secret.is_some())
            .finish_non_exhaustive()
    }
}

impl ApiState {
    /// Record `update_id`, returning `true` if it was already handled
    pub fn is_duplicate_update(&self, update_id: i64) -> bool {
        self.dedup
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_duplicate(update_id)
    }
}

/// Builder for the API server
pub struct ApiServerBuilder {
    runner: Arc<ConversationRunner>,
    port: u16,
    webhook_secret: Option<SecretString>,
    collaborators: Collaborators,
}

impl ApiServerBuilder {
    #[must_use]
    pub fn new(runner: Arc<ConversationRunner>, port: u16) -> Self {
        Self {
            runner,
            port,
            webhook_secret: None,
            collaborators: Collaborators::default(),
        }
    }

    /// Require this secret on webhook calls
    #[must_use]
    pub fn webhook_secret(mut self, secret: Option<SecretString>) -> Self {
        self.webhook_secret = secret;
        self
    }

    #[must_use]
    pub fn collaborators(mut self, collaborators: Collaborators) -> Self {
        self.collaborators = collaborators;
        self
    }

    #[must_use]
    pub fn build(self) -> ApiServer {
        let state = Arc::new(ApiState {
            store: Arc::clone(self.runner.store()),
            runner: self.runner,
            webhook_secret: self.webhook_secret,
            collaborators: self.collaborators,
            dedup: Mutex::new(UpdateDedup::default()),
        });

        ApiServer {
            state,
            port: self.port,
        }
    }
}

/// API server
#[derive(Debug)]
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    /// Build the router with all routes
    pub fn router(&self) -> Router {
        Router::new()
            .nest("/api/webhooks", webhooks::router(Arc::clone(&self.state)))
            .merge(health::router())
            .merge(health::ready_router(Arc::clone(&self.state)))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
