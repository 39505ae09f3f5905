//! Daemon - the main gateway service
//!
//! Wires the session store, collaborators, conversation runner, proactive
//! scheduler and HTTP API together and runs them until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::agent::{ComposerConfig, ConversationRunner, ReplyComposer};
use crate::api::{ApiServer, ApiServerBuilder, Collaborators};
use crate::channels::{Channel, IncomingMessage, LogChannel, TelegramChannel};
use crate::clock::{Clock, SystemClock};
use crate::config::TelegramMode;
use crate::context::PromptBuilder;
use crate::llm::{OpenAiClient, TextGenerator, Unconfigured};
use crate::naming::{Inflector, MorpherInflector, NameResolver};
use crate::persona::ToneClassifier;
use crate::proactive::{ProactiveScheduler, SilenceWindow};
use crate::session::SessionStore;
use crate::{Config, Result};

/// Pause after a failed `getUpdates` call
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Buffered messages between the polling loop and the runner
const POLL_QUEUE: usize = 100;

/// The nudge daemon
pub struct Daemon {
    config: Config,
    port: u16,
    runner: Arc<ConversationRunner>,
    scheduler: Arc<ProactiveScheduler>,
    telegram: Option<TelegramChannel>,
    collaborators: Collaborators,
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon")
            .field("port", &self.port)
            .field("collaborators", &self.collaborators)
            .field("telegram_mode", &self.config.telegram.mode)
            .finish_non_exhaustive()
    }
}

impl Daemon {
    /// Build every component from `config`
    ///
    /// # Errors
    ///
    /// Returns error if a collaborator client cannot be constructed or the
    /// silence window is invalid
    pub fn new(config: Config, port: u16) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store = Arc::new(SessionStore::new(config.max_history_chars));

        let generator: Arc<dyn TextGenerator> = match &config.llm.api_key {
            Some(key) => {
                tracing::info!(
                    url = %config.llm.api_url,
                    model = %config.llm.model,
                    "text generation client initialized"
                );
                Arc::new(OpenAiClient::new(config.llm.api_url.clone(), key.clone())?)
            }
            None => {
                tracing::warn!("no LLM API key configured; every reply will be the fallback");
                Arc::new(Unconfigured)
            }
        };

        let telegram = config.telegram.bot_token.clone().map(TelegramChannel::new);
        let channel: Arc<dyn Channel> = match &telegram {
            Some(tg) => Arc::new(tg.clone()),
            None => {
                tracing::warn!("no Telegram bot token configured; replies are only logged");
                Arc::new(LogChannel)
            }
        };

        let names = if config.inflection.enabled {
            let inflector: Arc<dyn Inflector> = Arc::new(MorpherInflector::new(
                config.inflection.url.clone(),
                config.inflection.token.clone(),
            )?);
            NameResolver::new(Some(inflector), config.inflection.cache_ttl)
        } else {
            NameResolver::disabled()
        };

        let composer = Arc::new(ReplyComposer::new(
            Arc::clone(&generator),
            PromptBuilder::new(config.prompt.clone()),
            ComposerConfig {
                model: config.llm.model.clone(),
                max_tokens: config.llm.max_tokens,
                temperature: config.llm.temperature,
                pacing: config.pacing,
                reengage_prompt: config.reengage_prompt.clone(),
            },
        ));

        let collaborators = Collaborators {
            llm: config.llm.api_key.as_ref().map(|_| generator.name()),
            channel: channel.name(),
            inflection: names.is_enabled(),
        };

        let runner = Arc::new(ConversationRunner::new(
            Arc::clone(&store),
            ToneClassifier::default().with_fallback(config.default_persona),
            names,
            Arc::clone(&composer),
            Arc::clone(&channel),
            Arc::clone(&clock),
        ));

        let window = SilenceWindow::new(config.proactive.silence_min, config.proactive.silence_max)?;
        let scheduler = Arc::new(ProactiveScheduler::new(
            store,
            composer,
            channel,
            clock,
            window,
            config.proactive.poll_interval,
        ));

        Ok(Self {
            config,
            port,
            runner,
            scheduler,
            telegram,
            collaborators,
        })
    }

    /// Build the API server for this daemon
    #[must_use]
    pub fn api_server(&self) -> ApiServer {
        ApiServerBuilder::new(Arc::clone(&self.runner), self.port)
            .webhook_secret(self.config.telegram.webhook_secret.clone())
            .collaborators(self.collaborators.clone())
            .build()
    }

    /// Run the daemon until Ctrl-C or a fatal server error
    ///
    /// # Errors
    ///
    /// Returns error if the API server fails
    pub async fn run(self) -> Result<()> {
        tracing::info!(
            port = self.port,
            mode = %self.config.telegram.mode,
            channel = self.collaborators.channel,
            "daemon running"
        );

        let scheduler = Arc::clone(&self.scheduler).spawn();
        let mut server = self.api_server().spawn();

        let polling = match (&self.telegram, self.config.telegram.mode) {
            (Some(tg), TelegramMode::Polling) => Some(self.spawn_polling(tg)),
            (None, TelegramMode::Polling) => {
                tracing::warn!("polling mode requested without a bot token; nothing to poll");
                None
            }
            _ => None,
        };

        let result = tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    tracing::error!(error = %e, "failed to listen for Ctrl-C");
                }
                tracing::info!("shutdown requested");
                Ok(())
            }
            res = &mut server => match res {
                Ok(inner) => inner,
                Err(e) => {
                    tracing::error!(error = %e, "API server task panicked");
                    Ok(())
                }
            },
        };

        scheduler.abort();
        server.abort();
        if let Some((poller, dispatcher)) = polling {
            poller.abort();
            dispatcher.abort();
        }

        result
    }

    /// Start long polling and a dispatcher feeding the runner
    fn spawn_polling(
        &self,
        telegram: &TelegramChannel,
    ) -> (tokio::task::JoinHandle<()>, tokio::task::JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<IncomingMessage>(POLL_QUEUE);
        let poller = telegram.start_polling(tx, POLL_ERROR_BACKOFF);

        let runner = Arc::clone(&self.runner);
        let dispatcher = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let runner = Arc::clone(&runner);
                tokio::spawn(async move {
                    let chat_id = message.chat_id;
                    let outcome = runner.handle_inbound(message).await;
                    tracing::debug!(chat_id, ?outcome, "polled message handled");
                });
            }
            tracing::info!("Telegram polling stopped");
        });

        (poller, dispatcher)
    }
}
