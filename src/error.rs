//! Error types for the nudge gateway

use thiserror::Error;

use crate::session::ChatId;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the nudge gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Delivery channel error
    #[error("channel error: {0}")]
    Channel(String),

    /// Text-generation collaborator error
    #[error("llm error: {0}")]
    Llm(String),

    /// Morphological inflection collaborator error
    #[error("inflection error: {0}")]
    Inflection(String),

    /// A persona tag outside the fixed set
    #[error("unknown persona tag: {0:?}")]
    UnknownPersona(String),

    /// Session state violates the data model
    #[error("session {chat_id} invariant violated: {reason}")]
    Invariant { chat_id: ChatId, reason: String },

    /// Operation on a chat that has never sent a message
    #[error("no session for chat {0}")]
    SessionNotFound(ChatId),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether this error signals a broken data model rather than a flaky collaborator
    #[must_use]
    pub const fn is_logic_bug(&self) -> bool {
        matches!(self, Self::UnknownPersona(_) | Self::Invariant { .. })
    }
}
