//! Proactive re-engagement of quiet chats
//!
//! After the bot replies, a chat waits in `AwaitingReply`. If the user stays
//! silent for a duration inside the configured [`SilenceWindow`], the bot
//! writes first, once. Only a new user message re-arms the chat.
//!
//! Each poll evaluates every session without side effects, claims the due ones
//! under their session lock and spawns one task per claim, so a slow
//! generation never holds up the next tick or other chats.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::agent::{ComposeInput, ComposedReply, ReplyComposer};
use crate::channels::{Channel, OutgoingMessage};
use crate::clock::{Clock, elapsed_between};
use crate::session::{ChatSession, PingCommit, Role, SessionStore};
use crate::{Error, Result};

/// Inclusive range of silence after a bot reply in which a ping may fire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SilenceWindow {
    min: Duration,
    max: Duration,
}

impl SilenceWindow {
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `min` exceeds `max`
    pub fn new(min: Duration, max: Duration) -> Result<Self> {
        if min > max {
            return Err(Error::Config(format!(
                "silence window min ({}s) exceeds max ({}s)",
                min.as_secs(),
                max.as_secs()
            )));
        }
        Ok(Self { min, max })
    }

    #[must_use]
    pub const fn min(&self) -> Duration {
        self.min
    }

    #[must_use]
    pub const fn max(&self) -> Duration {
        self.max
    }

    #[must_use]
    pub fn contains(&self, elapsed: Duration) -> bool {
        (self.min..=self.max).contains(&elapsed)
    }
}

/// Whether `session` should receive a proactive message at `now`
#[must_use]
pub fn is_due(session: &ChatSession, now: DateTime<Utc>, window: &SilenceWindow) -> bool {
    session.last_turn().is_some_and(|t| t.role == Role::Assistant)
        && session.ping_sent_at.is_none()
        && !session.ping_in_flight
        && session
            .last_bot_reply
            .and_then(|at| elapsed_between(at, now))
            .is_some_and(|elapsed| window.contains(elapsed))
}

/// Result of one proactive attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingOutcome {
    /// Delivered and recorded
    Sent,
    /// The user wrote while the ping was prepared; dropped
    Stale,
    /// Generation fell back; nothing sent, retried on a later tick
    Skipped,
    /// Delivery failed; retried on a later tick
    DeliveryFailed,
}

/// Background component that pings quiet chats
pub struct ProactiveScheduler {
    store: Arc<SessionStore>,
    composer: Arc<ReplyComposer>,
    channel: Arc<dyn Channel>,
    clock: Arc<dyn Clock>,
    window: SilenceWindow,
    poll_interval: Duration,
}

impl std::fmt::Debug for ProactiveScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProactiveScheduler")
            .field("window", &self.window)
            .field("poll_interval", &self.poll_interval)
            .field("channel", &self.channel.name())
            .finish_non_exhaustive()
    }
}

impl ProactiveScheduler {
    #[must_use]
    pub fn new(
        store: Arc<SessionStore>,
        composer: Arc<ReplyComposer>,
        channel: Arc<dyn Channel>,
        clock: Arc<dyn Clock>,
        window: SilenceWindow,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            composer,
            channel,
            clock,
            window,
            poll_interval,
        }
    }

    #[must_use]
    pub const fn window(&self) -> SilenceWindow {
        self.window
    }

    /// Scan every session once and start a ping for each due chat
    ///
    /// Returns the spawned attempts; callers may await them or let them run.
    pub async fn poll_once(&self) -> Vec<JoinHandle<PingOutcome>> {
        let now = self.clock.now();
        let max_chars = self.store.max_history_chars();
        let mut attempts = Vec::new();

        let mut due = Vec::new();
        self.store
            .for_each_session(|session| {
                if !is_due(session, now, &self.window) {
                    return;
                }
                if let Err(e) = session.check_invariants(max_chars) {
                    tracing::error!(chat_id = session.chat_id, error = %e, "skipping corrupt session");
                    return;
                }
                due.push(session.chat_id);
            })
            .await;

        for chat_id in due {
            let window = self.window;
            let Some(claimed) = self
                .store
                .try_claim_ping(chat_id, |s| is_due(s, now, &window))
                .await
            else {
                continue;
            };

            tracing::debug!(chat_id = claimed.chat_id, "proactive ping claimed");
            let task = PingTask {
                store: Arc::clone(&self.store),
                composer: Arc::clone(&self.composer),
                channel: Arc::clone(&self.channel),
                clock: Arc::clone(&self.clock),
            };
            attempts.push(tokio::spawn(task.run(claimed, now)));
        }

        attempts
    }

    /// Run [`poll_once`](Self::poll_once) on a fixed interval until aborted
    #[must_use]
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(
                poll_secs = self.poll_interval.as_secs(),
                min_secs = self.window.min.as_secs(),
                max_secs = self.window.max.as_secs(),
                "proactive scheduler started"
            );

            let mut interval = tokio::time::interval(self.poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // Skip the first immediate tick
            interval.tick().await;

            loop {
                interval.tick().await;
                let started = self.poll_once().await.len();
                if started > 0 {
                    tracing::debug!(started, "proactive pings started");
                }
            }
        })
    }
}

/// Everything one spawned attempt needs
struct PingTask {
    store: Arc<SessionStore>,
    composer: Arc<ReplyComposer>,
    channel: Arc<dyn Channel>,
    clock: Arc<dyn Clock>,
}

impl PingTask {
    async fn run(self, claimed: ChatSession, claimed_at: DateTime<Utc>) -> PingOutcome {
        let chat_id = claimed.chat_id;

        let text = match self.composer.compose(&claimed, ComposeInput::Reengage).await {
            ComposedReply::Generated(text) => text,
            ComposedReply::Fallback(_) => {
                tracing::warn!(chat_id, "proactive generation failed, will retry");
                self.store.release_ping(chat_id).await;
                return PingOutcome::Skipped;
            }
        };

        if self.store.user_active_since(chat_id, claimed_at).await {
            tracing::debug!(chat_id, "user spoke while ping was composed, dropping it");
            self.store.release_ping(chat_id).await;
            return PingOutcome::Stale;
        }

        if let Err(e) = self.channel.send(OutgoingMessage::text(chat_id, &text)).await {
            tracing::warn!(chat_id, error = %e, "failed to deliver proactive message");
            self.store.release_ping(chat_id).await;
            return PingOutcome::DeliveryFailed;
        }

        match self
            .store
            .commit_ping(chat_id, &text, claimed_at, self.clock.now())
            .await
        {
            Ok(PingCommit::Recorded) => {
                tracing::info!(chat_id, "proactive message sent");
                PingOutcome::Sent
            }
            Ok(PingCommit::Stale) => {
                tracing::debug!(chat_id, "proactive message delivered after user reply, not recorded");
                PingOutcome::Stale
            }
            Err(e) => {
                tracing::error!(chat_id, error = %e, "failed to record proactive message");
                self.store.release_ping(chat_id).await;
                PingOutcome::Stale
            }
        }
    }
}
