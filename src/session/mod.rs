//! In-memory session store
//!
//! One mutex per chat serializes that chat's mutations; the outer map lock is
//! held only long enough to look up or insert a handle, so different chats
//! never wait on each other. Locks are never held across collaborator calls:
//! callers take a snapshot, release, call out, then commit the result.
//!
//! Sessions live for the whole process. There is no eviction.

mod types;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::context::window;
use crate::naming::NameForms;
use crate::persona::Persona;
use crate::{Error, Result};

pub use types::{ChatId, ChatSession, Role, SessionPhase, Turn};

type SessionHandle = Arc<Mutex<ChatSession>>;

/// What happened when a proactive reply was committed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingCommit {
    /// Persisted as an assistant turn and `ping_sent_at` recorded
    Recorded,
    /// The user wrote while the ping was being prepared; nothing recorded
    Stale,
}

/// Shared store of every chat's state
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<ChatId, SessionHandle>>,
    max_history_chars: usize,
}

impl SessionStore {
    /// Create an empty store trimming histories to `max_history_chars`
    #[must_use]
    pub fn new(max_history_chars: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_history_chars,
        }
    }

    /// Character budget applied to every stored history
    #[must_use]
    pub const fn max_history_chars(&self) -> usize {
        self.max_history_chars
    }

    async fn handle(&self, chat_id: ChatId) -> Option<SessionHandle> {
        self.sessions.read().await.get(&chat_id).cloned()
    }

    async fn handle_or_create(&self, chat_id: ChatId, now: DateTime<Utc>) -> SessionHandle {
        if let Some(handle) = self.handle(chat_id).await {
            return handle;
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(chat_id)
            .or_insert_with(|| {
                tracing::debug!(chat_id, "creating session");
                Arc::new(Mutex::new(ChatSession::new(chat_id, Persona::default(), now)))
            })
            .clone()
    }

    async fn existing(&self, chat_id: ChatId) -> Result<SessionHandle> {
        self.handle(chat_id)
            .await
            .ok_or(Error::SessionNotFound(chat_id))
    }

    /// Fetch a chat's session, creating it on first contact
    pub async fn get_or_create(&self, chat_id: ChatId, now: DateTime<Utc>) -> ChatSession {
        self.handle_or_create(chat_id, now).await.lock().await.clone()
    }

    /// Append a turn, then trim the history to the budget
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionNotFound`] if the chat has no session
    pub async fn append_turn(
        &self,
        chat_id: ChatId,
        role: Role,
        content: impl Into<String>,
    ) -> Result<()> {
        let handle = self.existing(chat_id).await?;
        let mut session = handle.lock().await;
        self.push_trimmed(&mut session, Turn {
            role,
            content: content.into(),
        });
        Ok(())
    }

    /// Overwrite the chat's persona
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionNotFound`] if the chat has no session
    pub async fn update_persona(&self, chat_id: ChatId, persona: Persona) -> Result<()> {
        self.existing(chat_id).await?.lock().await.persona = persona;
        Ok(())
    }

    /// Store the user's name and its case forms
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionNotFound`] if the chat has no session
    pub async fn update_name(
        &self,
        chat_id: ChatId,
        name: impl Into<String>,
        forms: NameForms,
    ) -> Result<()> {
        let handle = self.existing(chat_id).await?;
        let mut session = handle.lock().await;
        session.user_name = Some(name.into());
        session.name_forms = Some(forms);
        Ok(())
    }

    /// Record inbound user activity; ends any proactive silence
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionNotFound`] if the chat has no session
    pub async fn mark_user_activity(&self, chat_id: ChatId, at: DateTime<Utc>) -> Result<()> {
        let handle = self.existing(chat_id).await?;
        let mut session = handle.lock().await;
        session.last_user_activity = at;
        session.ping_sent_at = None;
        Ok(())
    }

    /// Record an outbound message
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionNotFound`] if the chat has no session
    pub async fn mark_bot_reply(&self, chat_id: ChatId, at: DateTime<Utc>) -> Result<()> {
        self.existing(chat_id).await?.lock().await.last_bot_reply = Some(at);
        Ok(())
    }

    /// Record that a proactive message went out
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionNotFound`] if the chat has no session
    pub async fn mark_ping_sent(&self, chat_id: ChatId, at: DateTime<Utc>) -> Result<()> {
        self.existing(chat_id).await?.lock().await.ping_sent_at = Some(at);
        Ok(())
    }

    /// Owned copy of a chat's current state
    pub async fn snapshot(&self, chat_id: ChatId) -> Option<ChatSession> {
        let handle = self.handle(chat_id).await?;
        let session = handle.lock().await;
        Some(session.clone())
    }

    /// Snapshots of every session known at call time
    pub async fn snapshots(&self) -> Vec<ChatSession> {
        let handles: Vec<SessionHandle> = self.sessions.read().await.values().cloned().collect();

        let mut out = Vec::with_capacity(handles.len());
        for handle in handles {
            out.push(handle.lock().await.clone());
        }
        out
    }

    /// Visit every session known at call time
    ///
    /// Sessions created while iterating are not visited in this pass.
    pub async fn for_each_session<F>(&self, mut f: F)
    where
        F: FnMut(&ChatSession),
    {
        for session in self.snapshots().await {
            f(&session);
        }
    }

    /// Number of sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no chat has written yet
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Phase of a chat, if it exists
    pub async fn phase(&self, chat_id: ChatId) -> Option<SessionPhase> {
        self.snapshot(chat_id).await.map(|s| s.phase())
    }

    /// Apply an inbound user message atomically
    ///
    /// Marks activity (clearing any ping), sets the persona and appends the
    /// user turn. Returns the session as it was just before the turn was
    /// appended, with the new persona applied, for prompt building.
    pub async fn record_inbound(
        &self,
        chat_id: ChatId,
        text: &str,
        persona: Persona,
        at: DateTime<Utc>,
    ) -> ChatSession {
        let handle = self.handle_or_create(chat_id, at).await;
        let mut session = handle.lock().await;

        session.last_user_activity = at;
        session.ping_sent_at = None;
        session.persona = persona;
        let before = session.clone();

        self.push_trimmed(&mut session, Turn::user(text));
        before
    }

    /// Persist a generated reply and mark the outbound time
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionNotFound`] if the chat has no session
    pub async fn record_reply(&self, chat_id: ChatId, text: &str, at: DateTime<Utc>) -> Result<()> {
        let handle = self.existing(chat_id).await?;
        let mut session = handle.lock().await;
        self.push_trimmed(&mut session, Turn::assistant(text));
        session.last_bot_reply = Some(at);
        Ok(())
    }

    /// Claim the right to send a proactive message
    ///
    /// `due` is re-evaluated under the session lock. On success the session is
    /// flagged in flight and its snapshot returned; later claims fail until
    /// [`commit_ping`](Self::commit_ping) or [`release_ping`](Self::release_ping).
    pub async fn try_claim_ping<F>(&self, chat_id: ChatId, due: F) -> Option<ChatSession>
    where
        F: FnOnce(&ChatSession) -> bool,
    {
        let handle = self.handle(chat_id).await?;
        let mut session = handle.lock().await;

        if session.ping_in_flight || !due(&session) {
            return None;
        }

        session.ping_in_flight = true;
        Some(session.clone())
    }

    /// Finish a claimed ping that was delivered
    ///
    /// If the user wrote after `claimed_at` the ping is stale and nothing is
    /// recorded, so the silence window restarts from the next bot reply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionNotFound`] if the chat has no session
    pub async fn commit_ping(
        &self,
        chat_id: ChatId,
        text: &str,
        claimed_at: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Result<PingCommit> {
        let handle = self.existing(chat_id).await?;
        let mut session = handle.lock().await;
        session.ping_in_flight = false;

        if session.last_user_activity > claimed_at {
            return Ok(PingCommit::Stale);
        }

        self.push_trimmed(&mut session, Turn::assistant(text));
        session.last_bot_reply = Some(at);
        session.ping_sent_at = Some(at);
        Ok(PingCommit::Recorded)
    }

    /// Drop a claim without recording anything
    pub async fn release_ping(&self, chat_id: ChatId) {
        if let Some(handle) = self.handle(chat_id).await {
            handle.lock().await.ping_in_flight = false;
        }
    }

    /// Whether the user has written since `since`
    pub async fn user_active_since(&self, chat_id: ChatId, since: DateTime<Utc>) -> bool {
        self.snapshot(chat_id)
            .await
            .is_some_and(|s| s.last_user_activity > since)
    }

    fn push_trimmed(&self, session: &mut ChatSession, turn: Turn) {
        session.history.push(turn);
        let removed = window::trim_in_place(&mut session.history, self.max_history_chars);
        if removed > 0 {
            tracing::trace!(
                chat_id = session.chat_id,
                removed,
                kept = session.history.len(),
                "trimmed history"
            );
        }
    }
}
