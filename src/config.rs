//! Configuration management for QwenStudio.
//!
//! Configuration can be set via environment variables:
//! - `OPENROUTER_API_KEY` - Optional at startup. Without it every relay call
//!   fails with a configuration error instead of reaching the provider.
//! - `OPENROUTER_BASE_URL` - Optional. Defaults to `https://openrouter.ai/api/v1`.
//! - `ALLOWED_MODELS` - Optional. Comma-separated model allow-list; the first
//!   entry is the default model.
//! - `MAX_TOKENS` - Optional. Defaults to `2048`.
//! - `TEMPERATURE` - Optional. Defaults to `0.5`.
//! - `REQUEST_TIMEOUT_SECS` - Optional. Upstream timeout. Defaults to `120`.
//! - `HISTORY_TURNS` - Optional. Prior ask/reply pairs sent as context. Defaults to `0`.
//! - `APP_REFERER` / `APP_TITLE` - Optional. OpenRouter attribution headers.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `8888`.

use thiserror::Error;

/// Models the relay accepts, default first.
pub const DEFAULT_ALLOWED_MODELS: &[&str] = &[
    "qwen/qwen3-coder:free",
    "qwen/qwen-2.5-coder-32b-instruct",
    "deepseek/deepseek-chat-v3-0324:free",
];

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// OpenRouter API key
    pub api_key: Option<String>,

    /// Provider base URL (without `/chat/completions`)
    pub base_url: String,

    /// Model allow-list; never empty, first entry is the default
    pub allowed_models: Vec<String>,

    pub max_tokens: u64,

    pub temperature: f64,

    pub request_timeout_secs: u64,

    /// Number of previous ask/reply pairs forwarded as conversation history
    pub history_turns: usize,

    pub referer: String,

    pub title: String,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        let base_url =
            std::env::var("OPENROUTER_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let allowed_models = std::env::var("ALLOWED_MODELS")
            .map(|raw| parse_model_list(&raw))
            .unwrap_or_default();

        let defaults = Self::new(api_key);

        Ok(Self {
            base_url,
            allowed_models: if allowed_models.is_empty() {
                defaults.allowed_models.clone()
            } else {
                allowed_models
            },
            max_tokens: parse_var("MAX_TOKENS", defaults.max_tokens)?,
            temperature: parse_var("TEMPERATURE", defaults.temperature)?,
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs)?,
            history_turns: parse_var("HISTORY_TURNS", defaults.history_turns)?,
            referer: std::env::var("APP_REFERER").unwrap_or(defaults.referer.clone()),
            title: std::env::var("APP_TITLE").unwrap_or(defaults.title.clone()),
            host: std::env::var("HOST").unwrap_or(defaults.host.clone()),
            port: parse_var("PORT", defaults.port)?,
            ..defaults
        })
    }

    /// Create a config with default values (useful for testing).
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            allowed_models: DEFAULT_ALLOWED_MODELS.iter().map(|m| m.to_string()).collect(),
            max_tokens: 2048,
            temperature: 0.5,
            request_timeout_secs: 120,
            history_turns: 0,
            referer: "https://qwen-ide.netlify.app".to_string(),
            title: "QwenStudio".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8888,
        }
    }

    /// The model used when a request names none or an unknown one.
    pub fn default_model(&self) -> &str {
        self.allowed_models
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_ALLOWED_MODELS[0])
    }
}

fn parse_model_list(raw: &str) -> Vec<String> {
    let mut models: Vec<String> = Vec::new();
    for model in raw.split(',').map(str::trim).filter(|m| !m.is_empty()) {
        if !models.iter().any(|m| m == model) {
            models.push(model.to_string());
        }
    }
    models
}

fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}
