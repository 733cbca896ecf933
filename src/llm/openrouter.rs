//! OpenRouter API client implementation.
//!
//! One request per call. Failures are classified and returned; retrying is
//! left to the human on the other side of the editor.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::error::LlmError;
use super::{ChatMessage, ChatOptions, ChatResponse, LlmClient};
use crate::config::Config;

/// OpenRouter API client.
pub struct OpenRouterClient {
    client: Client,
    api_key: Option<String>,
    completions_url: String,
    referer: String,
    title: String,
}

impl OpenRouterClient {
    /// Build a client from the loaded configuration.
    ///
    /// A missing API key is not an error here; it surfaces as
    /// [`LlmError::Configuration`] on the first request instead.
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            completions_url: completions_url(&config.base_url),
            referer: config.referer.clone(),
            title: config.title.clone(),
        })
    }

    /// Execute a single request without retry.
    async fn execute_request(&self, request: &OpenRouterRequest) -> Result<ChatResponse, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::Configuration)?;

        let response = self
            .client
            .post(&self.completions_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(request)
            .send()
            .await
            .map_err(|e| LlmError::transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::rejected(status, &body));
        }

        let body = response.text().await.map_err(|e| LlmError::transport(&e))?;

        let parsed: OpenRouterResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(
                    "Unparsable success body from OpenRouter ({}), first 200 chars: {}",
                    e,
                    body.chars().take(200).collect::<String>()
                );
                return Ok(ChatResponse::default());
            }
        };

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.trim().is_empty());

        Ok(ChatResponse {
            content,
            model: parsed.model.filter(|m| !m.is_empty()),
        })
    }
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<ChatResponse, LlmError> {
        let request = OpenRouterRequest {
            model: model.to_string(),
            messages: messages.to_vec(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        tracing::debug!("Sending request to OpenRouter: model={}", model);
        let start = Instant::now();
        let result = self.execute_request(&request).await;
        match &result {
            Ok(_) => tracing::debug!("OpenRouter responded in {:?}", start.elapsed()),
            Err(LlmError::Configuration) => {
                tracing::warn!("OpenRouter request skipped: no API key configured")
            }
            Err(e) => tracing::warn!("OpenRouter request failed after {:?}: {}", start.elapsed(), e),
        }
        result
    }
}

fn completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

/// OpenRouter API request format.
#[derive(Debug, Serialize)]
struct OpenRouterRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
}

/// OpenRouter API response format. Every field is optional so that a
/// structurally odd success still deserializes and degrades to "no content".
#[derive(Debug, Deserialize)]
struct OpenRouterResponse {
    #[serde(default)]
    choices: Vec<OpenRouterChoice>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterChoice {
    #[serde(default)]
    message: Option<OpenRouterMessage>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterMessage {
    #[serde(default)]
    content: Option<String>,
}
