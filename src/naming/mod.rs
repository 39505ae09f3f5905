//! User name detection and case-aware rendering
//!
//! Names are picked up from self-introductions ("call me Alex", "меня зовут
//! Саша") and stored with their grammatical case forms so templates can address
//! the user correctly in inflected languages.

pub mod inflection;

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::session::ChatSession;

pub use inflection::{Inflector, MorpherInflector, NameResolver, resolve_forms};

/// Self-introduction trigger followed by the name token
static INTRODUCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:my name is|call me|меня зовут|зовите меня|зови меня|называй меня)\s+(\p{L}[\p{L}\p{M}'’-]*)",
    )
    .expect("introduction regex is valid")
});

/// Grammatical case of a name form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrammaticalCase {
    Nominative,
    Genitive,
    Dative,
    Accusative,
    Instrumental,
    Prepositional,
}

impl GrammaticalCase {
    pub const ALL: [Self; 6] = [
        Self::Nominative,
        Self::Genitive,
        Self::Dative,
        Self::Accusative,
        Self::Instrumental,
        Self::Prepositional,
    ];

    /// Template placeholder substituted with this form
    #[must_use]
    pub const fn placeholder(self) -> &'static str {
        match self {
            Self::Nominative => "{name_nom}",
            Self::Genitive => "{name_gen}",
            Self::Dative => "{name_dat}",
            Self::Accusative => "{name_acc}",
            Self::Instrumental => "{name_ins}",
            Self::Prepositional => "{name_pre}",
        }
    }
}

/// A name declined into every case
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NameForms {
    pub nominative: String,
    pub genitive: String,
    pub dative: String,
    pub accusative: String,
    pub instrumental: String,
    pub prepositional: String,
}

impl NameForms {
    /// Every case maps to the base name unchanged
    #[must_use]
    pub fn identity(name: &str) -> Self {
        Self {
            nominative: name.to_string(),
            genitive: name.to_string(),
            dative: name.to_string(),
            accusative: name.to_string(),
            instrumental: name.to_string(),
            prepositional: name.to_string(),
        }
    }

    #[must_use]
    pub fn get(&self, case: GrammaticalCase) -> &str {
        match case {
            GrammaticalCase::Nominative => &self.nominative,
            GrammaticalCase::Genitive => &self.genitive,
            GrammaticalCase::Dative => &self.dative,
            GrammaticalCase::Accusative => &self.accusative,
            GrammaticalCase::Instrumental => &self.instrumental,
            GrammaticalCase::Prepositional => &self.prepositional,
        }
    }
}

/// Find a self-introduced name in `text`
///
/// Only the single token right after the trigger phrase is taken; trailing
/// apostrophes and hyphens are stripped.
#[must_use]
pub fn extract_candidate_name(text: &str) -> Option<String> {
    let caps = INTRODUCTION.captures(text)?;
    let name = caps
        .get(1)?
        .as_str()
        .trim_end_matches(['\'', '’', '-']);
    (!name.is_empty()).then(|| name.to_string())
}

/// Substitute name placeholders with the session's stored forms
///
/// Without a stored name the template is returned verbatim.
#[must_use]
pub fn render_template(session: &ChatSession, template: &str) -> String {
    match (&session.name_forms, &session.user_name) {
        (Some(forms), _) => render_with_forms(forms, template),
        (None, Some(name)) => render_with_forms(&NameForms::identity(name), template),
        (None, None) => template.to_string(),
    }
}

/// Substitute `{name}` and every per-case placeholder from `forms`
#[must_use]
pub fn render_with_forms(forms: &NameForms, template: &str) -> String {
    GrammaticalCase::ALL.into_iter().fold(
        template.replace("{name}", &forms.nominative),
        |acc, case| acc.replace(case.placeholder(), forms.get(case)),
    )
}
