//! Keyword-driven tone classification
//!
//! Rules are evaluated in order and the first rule with a matching keyword
//! wins, so a message that is both rude and affectionate is classified hostile.

use super::Persona;

const HOSTILE_KEYWORDS: &[&str] = &[
    "idiot",
    "stupid",
    "dumb",
    "shut up",
    "hate you",
    "useless",
    "moron",
    "идиот",
    "дурак",
    "тупой",
    "тупая",
    "заткнись",
    "ненавижу",
    "бесишь",
];

const AFFECTIONATE_KEYWORDS: &[&str] = &[
    "love you",
    "miss you",
    "missed you",
    "sweetie",
    "darling",
    "hug",
    "kiss",
    "люблю",
    "скучаю",
    "милый",
    "милая",
    "обнимаю",
    "целую",
    "солнышко",
];

/// One row of the classification table
#[derive(Debug, Clone)]
pub struct ToneRule {
    /// Lowercase substrings that trigger this rule
    pub keywords: Vec<String>,
    /// Persona applied when the rule matches
    pub persona: Persona,
}

impl ToneRule {
    /// Build a rule, normalising keywords to lowercase
    #[must_use]
    pub fn new<I, S>(persona: Persona, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            persona,
        }
    }

    fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }
}

/// Stateless text → persona classifier
#[derive(Debug, Clone)]
pub struct ToneClassifier {
    rules: Vec<ToneRule>,
    fallback: Persona,
}

impl Default for ToneClassifier {
    fn default() -> Self {
        Self::with_rules(
            vec![
                ToneRule::new(Persona::Hostile, HOSTILE_KEYWORDS),
                ToneRule::new(Persona::Affectionate, AFFECTIONATE_KEYWORDS),
            ],
            Persona::Neutral,
        )
    }
}

impl ToneClassifier {
    /// Build a classifier from an ordered rule table
    #[must_use]
    pub fn with_rules(rules: Vec<ToneRule>, fallback: Persona) -> Self {
        Self { rules, fallback }
    }

    /// Same rules, different persona for messages no rule matches
    #[must_use]
    pub fn with_fallback(mut self, fallback: Persona) -> Self {
        self.fallback = fallback;
        self
    }

    /// Classify a message; the first matching rule wins
    #[must_use]
    pub fn classify(&self, text: &str) -> Persona {
        let lowered = text.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&lowered))
            .map_or(self.fallback, |rule| rule.persona)
    }
}
