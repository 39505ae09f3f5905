//! Shared test utilities

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Notify;

use nudge_gateway::agent::{ComposerConfig, ConversationRunner, PacingConfig, ReplyComposer, ReplyOutcome};
use nudge_gateway::channels::{Channel, IncomingMessage, OutgoingMessage};
use nudge_gateway::clock::{Clock, ManualClock};
use nudge_gateway::context::{PromptBuilder, PromptConfig};
use nudge_gateway::llm::{ChatRequest, TextGenerator};
use nudge_gateway::naming::{Inflector, NameResolver};
use nudge_gateway::persona::ToneClassifier;
use nudge_gateway::proactive::{PingOutcome, ProactiveScheduler, SilenceWindow};
use nudge_gateway::session::{ChatId, SessionStore};
use nudge_gateway::{Error, Result};

/// Silence window used by every harness: 60s..=120s
pub const WINDOW_MIN: Duration = Duration::from_secs(60);
pub const WINDOW_MAX: Duration = Duration::from_secs(120);

/// Fixed start instant for the manual clock
#[must_use]
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

/// Channel that records everything it is asked to deliver
#[derive(Debug, Default)]
pub struct MockChannel {
    sent: Mutex<Vec<OutgoingMessage>>,
    typing: Mutex<Vec<ChatId>>,
    failing: Mutex<HashSet<ChatId>>,
}

impl MockChannel {
    /// Every delivered message, in order
    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Texts delivered to one chat
    pub fn sent_to(&self, chat_id: ChatId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|m| m.chat_id == chat_id)
            .map(|m| m.content)
            .collect()
    }

    pub fn typing(&self) -> Vec<ChatId> {
        self.typing.lock().unwrap().clone()
    }

    /// Make sends to `chat_id` fail until [`recover`](Self::recover)
    pub fn fail_for(&self, chat_id: ChatId) {
        self.failing.lock().unwrap().insert(chat_id);
    }

    pub fn recover(&self, chat_id: ChatId) {
        self.failing.lock().unwrap().remove(&chat_id);
    }
}

#[async_trait]
impl Channel for MockChannel {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn send(&self, message: OutgoingMessage) -> Result<()> {
        if self.failing.lock().unwrap().contains(&message.chat_id) {
            return Err(Error::Channel(format!("chat {} unreachable", message.chat_id)));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn send_typing(&self, chat_id: ChatId) -> Result<()> {
        self.typing.lock().unwrap().push(chat_id);
        Ok(())
    }
}

/// Text generator answering from a script
///
/// Queued replies are used first; `None` entries fail. Once the queue is
/// empty every call answers `fallback_reply` (or fails when that is `None`).
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    queue: Mutex<VecDeque<Option<String>>>,
    fallback_reply: Option<String>,
    gate: Option<Arc<Notify>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedGenerator {
    /// Always answers `reply`
    pub fn always(reply: &str) -> Self {
        Self {
            fallback_reply: Some(reply.to_string()),
            ..Self::default()
        }
    }

    /// Every call fails
    pub fn failing() -> Self {
        Self::default()
    }

    /// Answer from `script` in order, then fail
    pub fn script(script: Vec<Option<&str>>) -> Self {
        Self {
            queue: Mutex::new(script.into_iter().map(|r| r.map(str::to_string)).collect()),
            ..Self::default()
        }
    }

    /// Block every call until `gate` is notified
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// System prompt of the most recent request
    pub fn last_system_prompt(&self) -> Option<String> {
        self.requests
            .lock()
            .unwrap()
            .last()
            .and_then(|r| r.messages.first())
            .map(|m| m.content.clone())
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn complete(&self, request: ChatRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let next = self.queue.lock().unwrap().pop_front();
        match next {
            Some(Some(reply)) => Ok(reply),
            Some(None) => Err(Error::Llm("scripted failure".to_string())),
            None => self
                .fallback_reply
                .clone()
                .ok_or_else(|| Error::Llm("scripted failure".to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Fully wired runner and scheduler over mock collaborators
pub struct Harness {
    pub clock: ManualClock,
    pub store: Arc<SessionStore>,
    pub channel: Arc<MockChannel>,
    pub generator: Arc<ScriptedGenerator>,
    pub runner: Arc<ConversationRunner>,
    pub scheduler: ProactiveScheduler,
}

impl Harness {
    pub fn new(generator: ScriptedGenerator) -> Self {
        Self::build(generator, None, PromptConfig::default())
    }

    pub fn with_inflector(generator: ScriptedGenerator, inflector: Arc<dyn Inflector>) -> Self {
        Self::build(generator, Some(inflector), PromptConfig::default())
    }

    pub fn with_prompt(generator: ScriptedGenerator, prompt: PromptConfig) -> Self {
        Self::build(generator, None, prompt)
    }

    fn build(
        generator: ScriptedGenerator,
        inflector: Option<Arc<dyn Inflector>>,
        prompt: PromptConfig,
    ) -> Self {
        let clock = ManualClock::new(epoch());
        let store = Arc::new(SessionStore::new(prompt.max_history_chars));
        let channel = Arc::new(MockChannel::default());
        let generator = Arc::new(generator);

        let composer = Arc::new(ReplyComposer::new(
            Arc::clone(&generator) as Arc<dyn TextGenerator>,
            PromptBuilder::new(prompt),
            ComposerConfig {
                pacing: PacingConfig::none(),
                ..ComposerConfig::default()
            },
        ));

        let names = NameResolver::new(inflector, Duration::from_secs(60));
        let runner = Arc::new(ConversationRunner::new(
            Arc::clone(&store),
            ToneClassifier::default(),
            names,
            Arc::clone(&composer),
            Arc::clone(&channel) as Arc<dyn Channel>,
            Arc::new(clock.clone()),
        ));

        let scheduler = ProactiveScheduler::new(
            Arc::clone(&store),
            composer,
            Arc::clone(&channel) as Arc<dyn Channel>,
            Arc::new(clock.clone()),
            SilenceWindow::new(WINDOW_MIN, WINDOW_MAX).unwrap(),
            Duration::from_secs(1),
        );

        Self {
            clock,
            store,
            channel,
            generator,
            runner,
            scheduler,
        }
    }

    /// Deliver a user message through the full inbound pipeline
    pub async fn say(&self, chat_id: ChatId, text: &str) -> ReplyOutcome {
        self.runner
            .handle_inbound(IncomingMessage::text(chat_id, text))
            .await
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn advance(&self, secs: u64) {
        self.clock.advance(Duration::from_secs(secs));
    }

    /// One scheduler tick, waiting for every attempt it started
    pub async fn tick(&self) -> Vec<PingOutcome> {
        let mut outcomes = Vec::new();
        for handle in self.scheduler.poll_once().await {
            outcomes.push(handle.await.unwrap());
        }
        outcomes
    }
}
