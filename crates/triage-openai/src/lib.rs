//! OpenAI-compatible chat backend
//!
//! Implements [`LanguageModel`] on top of a `POST {base_url}/chat/completions`
//! endpoint. Any server speaking that dialect works (OpenAI itself, Azure
//! deployments behind a proxy, local inference servers).
//!
//! One request per prompt: a fixed system message plus the prompt as the
//! user message. No streaming, no conversation state.

#![warn(unreachable_pub)]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use triage_core::config::secret_from_env;
use triage_core::{ConfigError, LanguageModel, ModelConfig, ModelError};

/// System message sent with every prompt
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Longest error body kept in a [`ModelError::Status`]
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Serialize, PartialEq)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize, PartialEq)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

fn build_request<'a>(model: &'a str, prompt: &'a str) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: SYSTEM_PROMPT,
            },
            ChatMessage {
                role: "user",
                content: prompt,
            },
        ],
    }
}

/// Pull the first choice's text out of a response body
fn extract_content(body: &str) -> Result<String, ModelError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| ModelError::Decode(e.to_string()))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or(ModelError::EmptyReply)
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

/// Chat completions client
#[derive(Clone)]
pub struct ChatCompletionsModel {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl ChatCompletionsModel {
    /// Create client for an endpoint
    ///
    /// # Arguments
    /// * `base_url` - API root such as `https://api.openai.com/v1`
    /// * `model` - Model name
    /// * `api_key` - Bearer token
    /// * `timeout` - Per-request timeout; `None` keeps reqwest's default
    ///
    /// # Errors
    /// Returns `ModelError::Transport` if the HTTP client cannot be built
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ModelError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    /// Create client from configuration, reading the key from the environment
    ///
    /// # Errors
    /// - `ConfigError::MissingSecret` if the key variable is unset
    /// - `ConfigError::Invalid` if the HTTP client cannot be built
    pub fn from_config(config: &ModelConfig) -> Result<Self, ConfigError> {
        let api_key = secret_from_env(&config.api_key_env)?;
        Self::new(&config.base_url, config.model.clone(), api_key, config.timeout())
            .map_err(|e| ConfigError::Invalid(format!("model client: {e}")))
    }

    /// Full URL requests are sent to
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Model name
    #[inline]
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LanguageModel for ChatCompletionsModel {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        let request = build_request(&self.model, prompt);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(ModelError::Status {
                status: status.as_u16(),
                body: truncate(body),
            });
        }

        tracing::debug!(model = %self.model, bytes = body.len(), "chat completion received");
        extract_content(&body)
    }
}

impl std::fmt::Debug for ChatCompletionsModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsModel")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}
