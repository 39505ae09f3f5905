//! Name inflection collaborator
//!
//! Declension is delegated to an external service. Its absence or failure is
//! never an error for callers: [`resolve_forms`] falls back to the identity
//! mapping so a reply can always be built.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mini_moka::sync::Cache;
use secrecy::{ExposeSecret, SecretString};

use super::NameForms;
use crate::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const CACHE_CAPACITY: u64 = 10_000;

/// Produces the case forms of a proper name
#[async_trait]
pub trait Inflector: Send + Sync {
    /// Decline `name` into every grammatical case
    ///
    /// # Errors
    ///
    /// Returns an error if the service is unreachable or answers garbage
    async fn inflect(&self, name: &str) -> Result<NameForms>;
}

/// Client for a Morpher-compatible declension service
///
/// `GET {base}/russian/declension?s=<name>&format=json` answering case keys
/// `Р Д В Т П` (the nominative is the input itself).
#[derive(Debug, Clone)]
pub struct MorpherInflector {
    client: reqwest::Client,
    base_url: String,
    token: Option<SecretString>,
}

impl MorpherInflector {
    /// Create a client for `base_url`
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(base_url: impl Into<String>, token: Option<SecretString>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }
}

#[async_trait]
impl Inflector for MorpherInflector {
    async fn inflect(&self, name: &str) -> Result<NameForms> {
        #[derive(serde::Deserialize)]
        struct Declension {
            #[serde(rename = "Р")]
            genitive: String,
            #[serde(rename = "Д")]
            dative: String,
            #[serde(rename = "В")]
            accusative: String,
            #[serde(rename = "Т")]
            instrumental: String,
            #[serde(rename = "П")]
            prepositional: String,
        }

        let url = format!("{}/russian/declension", self.base_url);
        let mut request = self
            .client
            .get(&url)
            .query(&[("s", name), ("format", "json")]);
        if let Some(token) = &self.token {
            request = request.query(&[("token", token.expose_secret())]);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inflection(format!(
                "declension service error {status}: {body}"
            )));
        }

        let body = response.text().await?;
        let declension: Declension = serde_json::from_str(&body)
            .map_err(|e| Error::Inflection(format!("unexpected declension payload: {e}")))?;

        Ok(NameForms {
            nominative: name.to_string(),
            genitive: declension.genitive,
            dative: declension.dative,
            accusative: declension.accusative,
            instrumental: declension.instrumental,
            prepositional: declension.prepositional,
        })
    }
}

/// Case forms for `name`, falling back to identity on any failure
pub async fn resolve_forms(inflector: Option<&dyn Inflector>, name: &str) -> NameForms {
    let Some(inflector) = inflector else {
        return NameForms::identity(name);
    };

    match inflector.inflect(name).await {
        Ok(forms) => forms,
        Err(e) => {
            tracing::warn!(name, error = %e, "inflection failed, using base name");
            NameForms::identity(name)
        }
    }
}

/// Caching front for an optional [`Inflector`]
///
/// Only successful declensions are cached; identity fallbacks are retried on
/// the next introduction.
#[derive(Clone)]
pub struct NameResolver {
    inflector: Option<Arc<dyn Inflector>>,
    cache: Cache<String, NameForms>,
}

impl std::fmt::Debug for NameResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NameResolver")
            .field("inflector", &self.inflector.is_some())
            .field("cached", &self.cache.entry_count())
            .finish()
    }
}

impl NameResolver {
    /// Resolver caching results for `ttl`
    #[must_use]
    pub fn new(inflector: Option<Arc<dyn Inflector>>, ttl: Duration) -> Self {
        Self {
            inflector,
            cache: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Resolver that always yields identity forms
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(None, Duration::from_secs(1))
    }

    /// Whether a declension service is configured
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inflector.is_some()
    }

    /// Case forms for `name`; never fails
    ///
    /// Forms equal to the identity mapping are not cached, so a failed
    /// lookup is retried on the next introduction.
    pub async fn resolve(&self, name: &str) -> NameForms {
        let Some(inflector) = &self.inflector else {
            return NameForms::identity(name);
        };

        let key = name.to_lowercase();
        if let Some(forms) = self.cache.get(&key) {
            tracing::trace!(name, "name forms cache hit");
            return forms;
        }

        let forms = resolve_forms(Some(inflector.as_ref()), name).await;
        if forms != NameForms::identity(name) {
            self.cache.insert(key, forms.clone());
        }
        forms
    }
}
