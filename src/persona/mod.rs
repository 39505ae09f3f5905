//! Persona masks
//!
//! A persona is the behavioural tone applied to the system instruction for a
//! single reply. The set is fixed; the active persona of a chat is recomputed
//! from every inbound message by the [`ToneClassifier`].

pub mod tone;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub use tone::{ToneClassifier, ToneRule};

/// Behavioural tone tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    /// The user is rude; answer with cold, sharp wit
    Hostile,
    /// The user is warm; answer tenderly
    Affectionate,
    /// Anything else
    #[default]
    Neutral,
}

/// A canned exchange showing the model how a persona sounds
#[derive(Debug, Clone, Copy)]
pub struct StyleExemplar {
    pub user: &'static str,
    pub assistant: &'static str,
}

const HOSTILE_EXEMPLARS: &[StyleExemplar] = &[
    StyleExemplar {
        user: "you are useless",
        assistant: "Bold words from someone who needed my help five minutes ago.",
    },
    StyleExemplar {
        user: "shut up",
        assistant: "Gladly. Right after you find a better conversation partner.",
    },
];

const AFFECTIONATE_EXEMPLARS: &[StyleExemplar] = &[
    StyleExemplar {
        user: "I missed you",
        assistant: "I missed you too. Tell me everything, how was your day?",
    },
    StyleExemplar {
        user: "you are sweet",
        assistant: "Only with you. You bring it out of me.",
    },
];

const NEUTRAL_EXEMPLARS: &[StyleExemplar] = &[StyleExemplar {
    user: "what are you up to?",
    assistant: "Thinking about our last chat, honestly. What are you doing?",
}];

impl Persona {
    /// Every persona, in classification precedence order
    pub const ALL: [Self; 3] = [Self::Hostile, Self::Affectionate, Self::Neutral];

    /// Stable lowercase tag
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Hostile => "hostile",
            Self::Affectionate => "affectionate",
            Self::Neutral => "neutral",
        }
    }

    /// Tone instruction appended to the character prompt
    #[must_use]
    pub const fn instruction(self) -> &'static str {
        match self {
            Self::Hostile => {
                "The user is being rude. Stay in character, answer briefly with cold, \
                 sarcastic wit. Never apologise and never become abusive yourself."
            }
            Self::Affectionate => {
                "The user is being warm and affectionate. Answer tenderly and playfully, \
                 show that you care about them."
            }
            Self::Neutral => {
                "Keep a friendly, casual tone, like a close friend texting back. \
                 Short messages, no lists, no formal language."
            }
        }
    }

    /// Few-shot exchanges demonstrating this persona's voice
    #[must_use]
    pub const fn exemplars(self) -> &'static [StyleExemplar] {
        match self {
            Self::Hostile => HOSTILE_EXEMPLARS,
            Self::Affectionate => AFFECTIONATE_EXEMPLARS,
            Self::Neutral => NEUTRAL_EXEMPLARS,
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Persona {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.tag().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnknownPersona(s.to_string()))
    }
}
