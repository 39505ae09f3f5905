//! Text-generation collaborator

mod openai;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};
use crate::session::{Role, Turn};

pub use openai::OpenAiClient;

/// Role of a prompt message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl From<Role> for ChatRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => Self::User,
            Role::Assistant => Self::Assistant,
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        })
    }
}

/// One entry of the ordered prompt
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

impl From<&Turn> for ChatMessage {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role.into(),
            content: turn.content.clone(),
        }
    }
}

/// A completion request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Something that turns a prompt into text
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails
    async fn complete(&self, request: ChatRequest) -> Result<String>;

    /// Backend name for logs and health checks
    fn name(&self) -> &'static str;
}

/// Stand-in used when no API key is configured
///
/// Every call fails, so the composer answers with the fallback reply and
/// proactive pings are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unconfigured;

#[async_trait]
impl TextGenerator for Unconfigured {
    async fn complete(&self, _request: ChatRequest) -> Result<String> {
        Err(Error::Llm("no API key configured".to_string()))
    }

    fn name(&self) -> &'static str {
        "unconfigured"
    }
}
