//! Nudge Gateway - a proactive conversational agent for Telegram
//!
//! Every chat gets an in-memory session with a bounded history. Replies are
//! generated by an LLM under a persona picked from the tone of the user's
//! latest message, and chats that go quiet receive exactly one unsolicited
//! follow-up inside a configurable silence window.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │          Telegram (webhook or long polling)            │
//! └───────────────────────────┬────────────────────────────┘
//!                             │
//! ┌───────────────────────────▼────────────────────────────┐
//! │                    Nudge Gateway                       │
//! │  ConversationRunner │ ProactiveScheduler │ SessionStore│
//! │  ToneClassifier  │  NameResolver  │  ReplyComposer     │
//! └───────────────────────────┬────────────────────────────┘
//!                             │
//! ┌───────────────────────────▼────────────────────────────┐
//! │   OpenAI-compatible LLM   │   Declension service       │
//! └────────────────────────────────────────────────────────┘
//! ```

pub mod agent;
pub mod api;
pub mod channels;
pub mod clock;
pub mod config;
pub mod context;
pub mod daemon;
pub mod error;
pub mod llm;
pub mod naming;
pub mod persona;
pub mod proactive;
pub mod session;

pub use config::Config;
pub use daemon::Daemon;
pub use error::{Error, Result};
pub use persona::Persona;
