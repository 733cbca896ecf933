//! Relay between the editor and the upstream completion provider.
//!
//! Picks the model, forwards the prompt plus optional history, and turns
//! whatever comes back into either assistant text or a classified failure.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::llm::{ChatMessage, ChatOptions, LlmClient, LlmError, OpenRouterClient, Role};

/// Substituted when the provider reports success but sends no usable text.
pub const NO_CONTENT_PLACEHOLDER: &str = "No response generated.";

/// One prior turn of conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryMessage {
    pub role: Role,
    pub content: String,
}

/// Relay request body.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<HistoryMessage>,
    #[serde(default)]
    pub model: Option<String>,
}

impl RelayRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            history: Vec::new(),
            model: None,
        }
    }
}

/// Relay success body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelayReply {
    pub content: String,
    pub model: String,
}

/// Fixed, ordered model allow-list. The first entry is the default.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: Vec<String>,
}

impl ModelCatalog {
    /// Build a catalog; an empty list falls back to the built-in defaults.
    pub fn new(models: Vec<String>) -> Self {
        let models: Vec<String> = models.into_iter().filter(|m| !m.trim().is_empty()).collect();
        if models.is_empty() {
            return Self::default();
        }
        Self { models }
    }

    pub fn default_model(&self) -> &str {
        &self.models[0]
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn contains(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }

    /// Resolve the requested model, silently substituting the default for
    /// anything not on the list.
    pub fn resolve<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        match requested.map(str::trim) {
            Some(model) if self.contains(model) => model,
            Some(model) => {
                tracing::debug!(
                    "Model '{}' is not allowed, falling back to {}",
                    model,
                    self.default_model()
                );
                self.default_model()
            }
            None => self.default_model(),
        }
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self {
            models: crate::config::DEFAULT_ALLOWED_MODELS
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }
}

/// Forwards prompts to the provider. Exactly one upstream call per request.
pub struct Relay {
    client: Arc<dyn LlmClient>,
    catalog: ModelCatalog,
    options: ChatOptions,
}

impl Relay {
    pub fn new(client: Arc<dyn LlmClient>, catalog: ModelCatalog, options: ChatOptions) -> Self {
        Self {
            client,
            catalog,
            options,
        }
    }

    /// Relay backed by OpenRouter, configured from `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = OpenRouterClient::from_config(config)?;
        Ok(Self::new(
            Arc::new(client),
            ModelCatalog::new(config.allowed_models.clone()),
            ChatOptions {
                temperature: Some(config.temperature),
                max_tokens: Some(config.max_tokens),
            },
        ))
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub async fn complete(&self, request: RelayRequest) -> Result<RelayReply, LlmError> {
        let model = self.catalog.resolve(request.model.as_deref()).to_string();

        let mut messages: Vec<ChatMessage> = request
            .history
            .into_iter()
            .map(|h| ChatMessage::new(h.role, h.content))
            .collect();
        messages.push(ChatMessage::user(request.message));

        let response = self
            .client
            .chat_completion(&model, &messages, &self.options)
            .await?;

        let content = match response.content {
            Some(content) if !content.trim().is_empty() => content,
            _ => {
                tracing::warn!("Provider returned no content for model {}", model);
                NO_CONTENT_PLACEHOLDER.to_string()
            }
        };

        Ok(RelayReply {
            content,
            model: response.model.unwrap_or(model),
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::llm::{ChatMessage, ChatOptions, ChatResponse, LlmClient, LlmError};

    /// A recorded upstream call.
    #[derive(Debug, Clone)]
    pub struct SeenCall {
        pub model: String,
        pub messages: Vec<ChatMessage>,
    }

    /// Client that replays queued results and records what it was sent.
    #[derive(Default)]
    pub struct ScriptedClient {
        replies: Mutex<VecDeque<Result<ChatResponse, LlmError>>>,
        calls: Mutex<Vec<SeenCall>>,
    }

    impl ScriptedClient {
        pub fn replying(content: &str) -> Self {
            let client = Self::default();
            client.push_content(content);
            client
        }

        pub fn push_content(&self, content: &str) {
            self.push(Ok(ChatResponse {
                content: Some(content.to_string()),
                model: None,
            }));
        }

        pub fn push(&self, reply: Result<ChatResponse, LlmError>) {
            self.replies.lock().unwrap().push_back(reply);
        }

        pub fn calls(&self) -> Vec<SeenCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn chat_completion(
            &self,
            model: &str,
            messages: &[ChatMessage],
            _options: &ChatOptions,
        ) -> Result<ChatResponse, LlmError> {
            self.calls.lock().unwrap().push(SeenCall {
                model: model.to_string(),
                messages: messages.to_vec(),
            });
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ChatResponse::default()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedClient;
    use super::*;
    use crate::llm::ChatResponse;

    fn relay_with(client: Arc<ScriptedClient>) -> Relay {
        Relay::new(client, ModelCatalog::default(), ChatOptions::default())
    }

    #[test]
    fn catalog_resolves_known_and_unknown_models() {
        let catalog = ModelCatalog::new(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(catalog.resolve(Some("b")), "b");
        assert_eq!(catalog.resolve(Some("retired/model")), "a");
        assert_eq!(catalog.resolve(Some("")), "a");
        assert_eq!(catalog.resolve(None), "a");
    }

    #[test]
    fn empty_catalog_falls_back_to_builtin_list() {
        let catalog = ModelCatalog::new(vec![" ".to_string()]);
        assert_eq!(catalog.default_model(), "qwen/qwen3-coder:free");
    }

    #[tokio::test]
    async fn unknown_model_uses_default_and_reports_it() {
        let client = Arc::new(ScriptedClient::replying("@@log@@\nhi"));
        let relay = relay_with(client.clone());

        let mut request = RelayRequest::new("hello");
        request.model = Some("openai/gpt-2".to_string());
        let reply = relay.complete(request).await.unwrap();

        assert_eq!(reply.model, "qwen/qwen3-coder:free");
        assert_eq!(client.calls()[0].model, "qwen/qwen3-coder:free");
    }

    #[tokio::test]
    async fn allowed_model_is_forwarded() {
        let client = Arc::new(ScriptedClient::replying("ok"));
        let relay = relay_with(client.clone());

        let mut request = RelayRequest::new("hello");
        request.model = Some("qwen/qwen-2.5-coder-32b-instruct".to_string());
        let reply = relay.complete(request).await.unwrap();

        assert_eq!(reply.model, "qwen/qwen-2.5-coder-32b-instruct");
    }

    #[tokio::test]
    async fn provider_reported_model_wins() {
        let client = Arc::new(ScriptedClient::default());
        client.push(Ok(ChatResponse {
            content: Some("ok".to_string()),
            model: Some("qwen/qwen3-coder-480b".to_string()),
        }));
        let reply = relay_with(client).complete(RelayRequest::new("x")).await.unwrap();
        assert_eq!(reply.model, "qwen/qwen3-coder-480b");
    }

    #[tokio::test]
    async fn missing_content_becomes_placeholder() {
        let client = Arc::new(ScriptedClient::default());
        client.push(Ok(ChatResponse::default()));
        client.push(Ok(ChatResponse {
            content: Some("  \n ".to_string()),
            model: None,
        }));
        let relay = relay_with(client);

        for _ in 0..2 {
            let reply = relay.complete(RelayRequest::new("x")).await.unwrap();
            assert_eq!(reply.content, NO_CONTENT_PLACEHOLDER);
            assert!(!reply.content.is_empty());
        }
    }

    #[tokio::test]
    async fn history_precedes_message() {
        let client = Arc::new(ScriptedClient::replying("ok"));
        let relay = relay_with(client.clone());

        let request = RelayRequest {
            message: "third".to_string(),
            history: vec![
                HistoryMessage {
                    role: Role::User,
                    content: "first".to_string(),
                },
                HistoryMessage {
                    role: Role::Assistant,
                    content: "second".to_string(),
                },
            ],
            model: None,
        };
        relay.complete(request).await.unwrap();

        let sent = &client.calls()[0].messages;
        let contents: Vec<&str> = sent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
        assert_eq!(sent[2].role, Role::User);
    }

    #[tokio::test]
    async fn errors_pass_through_unretried() {
        let client = Arc::new(ScriptedClient::default());
        client.push(Err(LlmError::Transport("Connection failed: reset".to_string())));
        client.push(Ok(ChatResponse {
            content: Some("should not be reached".to_string()),
            model: None,
        }));
        let relay = relay_with(client.clone());

        let err = relay.complete(RelayRequest::new("x")).await.unwrap_err();
        assert!(matches!(err, LlmError::Transport(_)));
        assert_eq!(client.calls().len(), 1);
    }

    #[test]
    fn request_history_and_model_are_optional() {
        let req: RelayRequest = serde_json::from_str(r#"{"message":"hi"}"#).unwrap();
        assert_eq!(req.message, "hi");
        assert!(req.history.is_empty());
        assert!(req.model.is_none());
    }
}
