//! Reply composition: prompt, one generation call, pacing

use std::sync::Arc;
use std::time::Duration;

use crate::context::PromptBuilder;
use crate::llm::{ChatMessage, ChatRequest, TextGenerator};
use crate::session::ChatSession;

/// Sent when generation fails; never stored in history
pub const FALLBACK_REPLY: &str = "Sorry, I got distracted for a second. What were you saying?";

/// Instruction appended in place of a user message for proactive replies
pub const REENGAGE_PROMPT: &str = "[The user has been quiet for a while. Write to them first: \
     one or two short messages continuing the conversation naturally and in character. Do \
     not say that you noticed the silence.]";

/// Typing-speed delay applied before a generated reply is released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingConfig {
    pub min: Duration,
    pub max: Duration,
    pub per_char: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(1000),
            max: Duration::from_millis(8000),
            per_char: Duration::from_millis(40),
        }
    }
}

impl PacingConfig {
    /// No artificial delay
    #[must_use]
    pub const fn none() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
            per_char: Duration::ZERO,
        }
    }

    /// `clamp(chars * per_char, min, max)`
    #[must_use]
    pub fn delay_for(&self, text: &str) -> Duration {
        let chars = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
        let max = self.max.max(self.min);
        self.per_char.saturating_mul(chars).clamp(self.min, max)
    }
}

/// What the new turn of the prompt is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeInput<'a> {
    /// The user's message
    User(&'a str),
    /// A synthesized re-engagement instruction
    Reengage,
}

/// Result of a compose call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposedReply {
    /// Text produced by the generator
    Generated(String),
    /// Canned text used because generation failed
    Fallback(String),
}

impl ComposedReply {
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Generated(t) | Self::Fallback(t) => t,
        }
    }

    #[must_use]
    pub const fn is_generated(&self) -> bool {
        matches!(self, Self::Generated(_))
    }
}

/// Generation settings for the composer
#[derive(Debug, Clone)]
pub struct ComposerConfig {
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub pacing: PacingConfig,
    pub reengage_prompt: String,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_tokens: Some(512),
            temperature: Some(0.9),
            pacing: PacingConfig::default(),
            reengage_prompt: REENGAGE_PROMPT.to_string(),
        }
    }
}

/// Builds prompts and calls the text generator
pub struct ReplyComposer {
    generator: Arc<dyn TextGenerator>,
    prompts: PromptBuilder,
    config: ComposerConfig,
}

impl std::fmt::Debug for ReplyComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyComposer")
            .field("generator", &self.generator.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ReplyComposer {
    #[must_use]
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        prompts: PromptBuilder,
        config: ComposerConfig,
    ) -> Self {
        Self {
            generator,
            prompts,
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ComposerConfig {
        &self.config
    }

    /// Name of the backing generator
    #[must_use]
    pub fn generator_name(&self) -> &'static str {
        self.generator.name()
    }

    /// Compose a reply for `session`
    ///
    /// `session` must hold the history *before* the new turn. Failures never
    /// propagate: an error or empty completion yields
    /// [`ComposedReply::Fallback`], and only generated text is paced.
    pub async fn compose(&self, session: &ChatSession, input: ComposeInput<'_>) -> ComposedReply {
        let new_message = match input {
            ComposeInput::User(text) => ChatMessage::user(text),
            ComposeInput::Reengage => ChatMessage::user(self.config.reengage_prompt.clone()),
        };

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: self.prompts.build(session, new_message),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        tracing::debug!(
            chat_id = session.chat_id,
            persona = %session.persona,
            messages = request.messages.len(),
            "requesting completion"
        );

        let text = match self.generator.complete(request).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                tracing::warn!(chat_id = session.chat_id, error = %e, "generation failed, using fallback");
                return ComposedReply::Fallback(FALLBACK_REPLY.to_string());
            }
        };

        if text.is_empty() {
            tracing::warn!(chat_id = session.chat_id, "empty completion, using fallback");
            return ComposedReply::Fallback(FALLBACK_REPLY.to_string());
        }

        let delay = self.config.pacing.delay_for(&text);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        ComposedReply::Generated(text)
    }
}
