//! Per-chat conversation state

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::window;
use crate::naming::NameForms;
use crate::persona::Persona;
use crate::{Error, Result};

/// Chat identifier (Telegram chat IDs are signed 64-bit)
pub type ChatId = i64;

/// Who authored a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Lowercase wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    /// A turn written by the user
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// A turn written by the bot
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Content length in characters
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// Where a conversation stands with respect to proactive messaging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// The user spoke last (or nothing has been said yet)
    Active,
    /// The bot replied and is waiting; a ping may fire
    AwaitingReply,
    /// A proactive message went out; waiting for the user
    Pinged,
}

/// State of one conversation
///
/// Values handed out by [`SessionStore`](super::SessionStore) are owned
/// snapshots; mutating them never affects the store.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub chat_id: ChatId,
    /// Chronological turns, oldest first
    pub history: Vec<Turn>,
    pub persona: Persona,
    pub user_name: Option<String>,
    pub name_forms: Option<NameForms>,
    pub last_user_activity: DateTime<Utc>,
    pub last_bot_reply: Option<DateTime<Utc>>,
    pub ping_sent_at: Option<DateTime<Utc>>,
    /// A proactive reply is currently being composed for this chat
    pub ping_in_flight: bool,
}

impl ChatSession {
    /// Fresh session for a chat first heard from at `now`
    #[must_use]
    pub fn new(chat_id: ChatId, persona: Persona, now: DateTime<Utc>) -> Self {
        Self {
            chat_id,
            history: Vec::new(),
            persona,
            user_name: None,
            name_forms: None,
            last_user_activity: now,
            last_bot_reply: None,
            ping_sent_at: None,
            ping_in_flight: false,
        }
    }

    /// Most recent turn, if any
    #[must_use]
    pub fn last_turn(&self) -> Option<&Turn> {
        self.history.last()
    }

    /// Current proactive phase derived from the stored timestamps
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        if self.ping_sent_at.is_some() {
            SessionPhase::Pinged
        } else if self.last_turn().is_some_and(|t| t.role == Role::Assistant) {
            SessionPhase::AwaitingReply
        } else {
            SessionPhase::Active
        }
    }

    /// Verify the data-model invariants
    ///
    /// # Errors
    ///
    /// Returns [`Error::Invariant`] describing the first violation found
    pub fn check_invariants(&self, max_history_chars: usize) -> Result<()> {
        let total = window::total_chars(&self.history);
        if total > max_history_chars {
            return Err(self.violation(format!(
                "history holds {total} chars, budget is {max_history_chars}"
            )));
        }

        if let Some(pinged) = self.ping_sent_at {
            let Some(replied) = self.last_bot_reply else {
                return Err(self.violation("ping recorded without any bot reply".to_string()));
            };
            if pinged > replied {
                return Err(self.violation(format!(
                    "ping at {pinged} is newer than last bot reply at {replied}"
                )));
            }
            if self.last_turn().is_some_and(|t| t.role == Role::User) {
                return Err(self.violation("ping still set after a user turn".to_string()));
            }
        }

        Ok(())
    }

    fn violation(&self, reason: String) -> Error {
        Error::Invariant {
            chat_id: self.chat_id,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    fn session() -> ChatSession {
        ChatSession::new(42, Persona::Neutral, Utc::now())
    }

    #[test]
    fn char_len_counts_characters_not_bytes() {
        assert_eq!(Turn::user("привет").char_len(), 6);
        assert_eq!(Turn::user("hi").char_len(), 2);
    }

    #[test]
    fn phase_follows_last_turn_and_ping() {
        let mut s = session();
        assert_eq!(s.phase(), SessionPhase::Active);

        s.history.push(Turn::user("hey"));
        assert_eq!(s.phase(), SessionPhase::Active);

        s.history.push(Turn::assistant("hi!"));
        s.last_bot_reply = Some(Utc::now());
        assert_eq!(s.phase(), SessionPhase::AwaitingReply);

        s.ping_sent_at = s.last_bot_reply;
        assert_eq!(s.phase(), SessionPhase::Pinged);
    }

    #[test]
    fn fresh_session_satisfies_invariants() {
        assert!(session().check_invariants(100).is_ok());
    }

    #[test]
    fn over_budget_history_is_a_violation() {
        let mut s = session();
        s.history.push(Turn::user("0123456789"));
        let err = s.check_invariants(5).unwrap_err();
        assert!(matches!(err, Error::Invariant { chat_id: 42, .. }));
    }

    #[test]
    fn ping_without_reply_is_a_violation() {
        let mut s = session();
        s.ping_sent_at = Some(Utc::now());
        assert!(s.check_invariants(100).is_err());
    }

    #[test]
    fn ping_after_user_turn_is_a_violation() {
        let now = Utc::now();
        let mut s = session();
        s.history.push(Turn::assistant("still there?"));
        s.history.push(Turn::user("yes"));
        s.last_bot_reply = Some(now);
        s.ping_sent_at = Some(now - TimeDelta::seconds(1));
        assert!(s.check_invariants(100).unwrap_err().is_logic_bug());
    }
}
