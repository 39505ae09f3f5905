//! Prompt assembly for a single generation call

use crate::llm::ChatMessage;
use crate::naming::render_template;
use crate::session::ChatSession;

use super::window;

/// Default character prompt used when none is configured
pub const DEFAULT_CHARACTER_PROMPT: &str = "You are a close friend chatting with the user in a \
     messenger. You have your own mood and opinions. Never mention that you are an AI. Reply \
     in the language the user writes in.";

/// Default addendum used when the user's name is known
pub const DEFAULT_NAME_ADDENDUM: &str =
    "The user's name is {name}. Use it now and then, naturally.";

/// Prompt-building settings
#[derive(Debug, Clone)]
pub struct PromptConfig {
    /// Base character description
    pub character_prompt: String,
    /// Rendered through the name placeholders and appended when a name is stored
    pub name_addendum: String,
    /// Whether to insert persona style exemplars before the history
    pub style_exemplars: bool,
    /// Character budget for replayed history
    pub max_history_chars: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            character_prompt: DEFAULT_CHARACTER_PROMPT.to_string(),
            name_addendum: DEFAULT_NAME_ADDENDUM.to_string(),
            style_exemplars: true,
            max_history_chars: 4000,
        }
    }
}

/// Builds the ordered message list sent to text generation
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    config: PromptConfig,
}

impl PromptBuilder {
    #[must_use]
    pub const fn new(config: PromptConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &PromptConfig {
        &self.config
    }

    /// System instruction for the session's persona and name
    #[must_use]
    pub fn system_prompt(&self, session: &ChatSession) -> String {
        let mut parts = vec![
            self.config.character_prompt.trim().to_string(),
            session.persona.instruction().to_string(),
        ];

        if session.user_name.is_some() && !self.config.name_addendum.is_empty() {
            parts.push(render_template(session, &self.config.name_addendum));
        }

        parts.retain(|p| !p.is_empty());
        parts.join("\n\n")
    }

    /// Assemble system, exemplars, trimmed history and the new message
    #[must_use]
    pub fn build(&self, session: &ChatSession, new_message: ChatMessage) -> Vec<ChatMessage> {
        let history = window::trim(&session.history, self.config.max_history_chars);
        let exemplars = if self.config.style_exemplars {
            session.persona.exemplars()
        } else {
            &[]
        };

        let mut messages = Vec::with_capacity(2 + exemplars.len() * 2 + history.len());
        messages.push(ChatMessage::system(self.system_prompt(session)));

        for exemplar in exemplars {
            messages.push(ChatMessage::user(exemplar.user));
            messages.push(ChatMessage::assistant(exemplar.assistant));
        }

        messages.extend(history.iter().map(ChatMessage::from));
        messages.push(new_message);
        messages
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::llm::ChatRole;
    use crate::naming::NameForms;
    use crate::persona::Persona;
    use crate::session::Turn;

    fn builder(exemplars: bool) -> PromptBuilder {
        PromptBuilder::new(PromptConfig {
            character_prompt: "You are Mira.".to_string(),
            name_addendum: "Call the user {name_nom}.".to_string(),
            style_exemplars: exemplars,
            max_history_chars: 10,
        })
    }

    #[test]
    fn system_prompt_carries_persona_instruction() {
        let session = ChatSession::new(1, Persona::Hostile, Utc::now());
        let prompt = builder(false).system_prompt(&session);
        assert!(prompt.starts_with("You are Mira."));
        assert!(prompt.contains(Persona::Hostile.instruction()));
        assert!(!prompt.contains("Call the user"));
    }

    #[test]
    fn name_addendum_is_rendered_when_name_known() {
        let mut session = ChatSession::new(1, Persona::Neutral, Utc::now());
        session.user_name = Some("Alex".into());
        session.name_forms = Some(NameForms::identity("Alex"));
        assert!(builder(false).system_prompt(&session).ends_with("Call the user Alex."));
    }

    #[test]
    fn messages_are_ordered_and_history_trimmed() {
        let mut session = ChatSession::new(1, Persona::Affectionate, Utc::now());
        session.history = vec![
            Turn::user("old message"),
            Turn::assistant("hey"),
            Turn::user("sup"),
        ];

        let messages = builder(true).build(&session, ChatMessage::user("new"));
        let exemplar_count = Persona::Affectionate.exemplars().len() * 2;

        assert_eq!(messages[0].role, ChatRole::System);
        assert_eq!(messages[1].content, Persona::Affectionate.exemplars()[0].user);
        let rest = &messages[1 + exemplar_count..];
        assert_eq!(
            rest,
            &[
                ChatMessage::assistant("hey"),
                ChatMessage::user("sup"),
                ChatMessage::user("new"),
            ]
        );
    }

    #[test]
    fn exemplars_can_be_disabled() {
        let session = ChatSession::new(1, Persona::Neutral, Utc::now());
        let messages = builder(false).build(&session, ChatMessage::user("hi"));
        assert_eq!(messages.len(), 2);
    }
}
