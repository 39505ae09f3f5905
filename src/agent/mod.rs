//! Conversation agent: reply composition and the inbound pipeline

pub mod composer;
mod runner;

pub use composer::{
    ComposeInput, ComposedReply, ComposerConfig, FALLBACK_REPLY, PacingConfig, REENGAGE_PROMPT,
    ReplyComposer,
};
pub use runner::{ConversationRunner, ReplyOutcome};
