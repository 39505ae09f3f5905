//! Conversation context: history window and prompt assembly

mod builder;
pub mod window;

pub use builder::{DEFAULT_CHARACTER_PROMPT, DEFAULT_NAME_ADDENDUM, PromptBuilder, PromptConfig};
pub use window::{total_chars, trim, trim_in_place};
