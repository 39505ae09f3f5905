//! Inbound conversation pipeline
//!
//! classify → record → learn name → typing → compose → deliver → commit

use std::sync::Arc;

use crate::agent::composer::{ComposeInput, ComposedReply, ReplyComposer};
use crate::channels::{Channel, IncomingMessage, OutgoingMessage};
use crate::clock::Clock;
use crate::naming::{NameResolver, extract_candidate_name};
use crate::persona::ToneClassifier;
use crate::session::SessionStore;

/// How an inbound message was answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// A generated reply was delivered and stored
    Replied(String),
    /// Generation failed; the fallback was delivered but not stored
    Fallback,
    /// Nothing reached the user
    DeliveryFailed,
    /// Message had no usable text
    Ignored,
}

/// Handles one inbound message end to end
pub struct ConversationRunner {
    store: Arc<SessionStore>,
    classifier: ToneClassifier,
    names: NameResolver,
    composer: Arc<ReplyComposer>,
    channel: Arc<dyn Channel>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ConversationRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationRunner")
            .field("channel", &self.channel.name())
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}

impl ConversationRunner {
    #[must_use]
    pub fn new(
        store: Arc<SessionStore>,
        classifier: ToneClassifier,
        names: NameResolver,
        composer: Arc<ReplyComposer>,
        channel: Arc<dyn Channel>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            classifier,
            names,
            composer,
            channel,
            clock,
        }
    }

    #[must_use]
    pub const fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Process one user message and answer it
    ///
    /// Never fails: collaborator errors are logged and reflected in the
    /// returned outcome.
    pub async fn handle_inbound(&self, message: IncomingMessage) -> ReplyOutcome {
        let chat_id = message.chat_id;
        let text = message.text.trim();
        if text.is_empty() {
            return ReplyOutcome::Ignored;
        }

        let persona = self.classifier.classify(text);
        let mut session = self
            .store
            .record_inbound(chat_id, text, persona, self.clock.now())
            .await;
        tracing::debug!(chat_id, %persona, history = session.history.len(), "inbound message recorded");

        if let Some(name) = extract_candidate_name(text) {
            let forms = self.names.resolve(&name).await;
            if let Err(e) = self.store.update_name(chat_id, name.clone(), forms.clone()).await {
                tracing::error!(chat_id, error = %e, "failed to store user name");
            } else {
                tracing::info!(chat_id, name = %name, "learned user name");
            }
            session.user_name = Some(name);
            session.name_forms = Some(forms);
        }

        if let Err(e) = self.channel.send_typing(chat_id).await {
            tracing::debug!(chat_id, error = %e, "typing indicator failed");
        }

        let reply = self.composer.compose(&session, ComposeInput::User(text)).await;

        if let Err(e) = self
            .channel
            .send(OutgoingMessage::text(chat_id, reply.text()))
            .await
        {
            tracing::warn!(chat_id, error = %e, "failed to deliver reply");
            return ReplyOutcome::DeliveryFailed;
        }

        let sent_at = self.clock.now();
        let outcome = match reply {
            ComposedReply::Generated(text) => {
                if let Err(e) = self.store.record_reply(chat_id, &text, sent_at).await {
                    tracing::error!(chat_id, error = %e, "failed to record reply");
                }
                ReplyOutcome::Replied(text)
            }
            ComposedReply::Fallback(_) => {
                if let Err(e) = self.store.mark_bot_reply(chat_id, sent_at).await {
                    tracing::error!(chat_id, error = %e, "failed to mark fallback reply");
                }
                ReplyOutcome::Fallback
            }
        };

        if let Some(snapshot) = self.store.snapshot(chat_id).await
            && let Err(e) = snapshot.check_invariants(self.store.max_history_chars())
        {
            tracing::error!(chat_id, error = %e, "session invariant violated after reply");
        }

        outcome
    }
}
