//! OpenAI-compatible chat completions client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{ChatMessage, ChatRequest, TextGenerator};
use crate::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Client for any `/chat/completions` endpoint speaking the `OpenAI` dialect
pub struct OpenAiClient {
    client: Client,
    api_url: String,
    api_key: SecretString,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl OpenAiClient {
    /// Create a client for `api_url` (e.g. `https://api.openai.com/v1`)
    ///
    /// # Errors
    ///
    /// Returns error if the key is empty or the HTTP client cannot be built
    pub fn new(api_url: impl Into<String>, api_key: SecretString) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("LLM API key required".to_string()));
        }

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn complete(&self, request: ChatRequest) -> Result<String> {
        let body = CompletionRequest {
            model: &request.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Llm(format!("completion request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Llm(format!("completion API error {status}: {body}")));
        }

        let result: CompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Llm(format!("failed to parse completion: {e}")))?;

        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Llm("completion had no content".to_string()))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
