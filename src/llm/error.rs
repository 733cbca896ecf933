//! LLM error types.
//!
//! Every failure the relay can report maps onto one of three kinds. None of
//! them is retried automatically; each user action is exactly one upstream
//! round trip.

use thiserror::Error;

/// Error from an upstream completion call.
#[derive(Debug, Error)]
pub enum LlmError {
    /// No credential is available to reach the provider.
    #[error("OpenRouter API key not set in environment")]
    Configuration,

    /// The provider answered with a non-success status.
    #[error("upstream rejected request (HTTP {status}): {detail}")]
    UpstreamRejection { status: u16, detail: String },

    /// The request itself failed (DNS, connect, timeout, body read).
    #[error("transport failure: {0}")]
    Transport(String),
}

impl LlmError {
    /// Build an upstream rejection from the response status and raw body.
    ///
    /// Prefers the provider's structured `error.message`, then the status
    /// reason phrase, then the bare numeric code.
    pub fn rejected(status: reqwest::StatusCode, body: &str) -> Self {
        let detail = provider_error_message(body)
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| status.as_str().to_string());
        Self::UpstreamRejection {
            status: status.as_u16(),
            detail,
        }
    }

    /// Build a transport error from a reqwest failure.
    pub fn transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transport(format!("Request timeout: {}", err))
        } else if err.is_connect() {
            Self::Transport(format!("Connection failed: {}", err))
        } else {
            Self::Transport(format!("Request failed: {}", err))
        }
    }

    pub fn kind(&self) -> LlmErrorKind {
        match self {
            Self::Configuration => LlmErrorKind::Configuration,
            Self::UpstreamRejection { .. } => LlmErrorKind::UpstreamRejection,
            Self::Transport(_) => LlmErrorKind::Transport,
        }
    }

    /// Short headline used as the `error` field of relay responses.
    pub fn summary(&self) -> &'static str {
        match self {
            Self::Configuration => "OpenRouter API key not set in environment",
            Self::UpstreamRejection { .. } => "AI request failed",
            Self::Transport(_) => "Request failed",
        }
    }

    /// Provider or transport detail, used as the `details` field.
    pub fn details(&self) -> Option<&str> {
        match self {
            Self::Configuration => None,
            Self::UpstreamRejection { detail, .. } => Some(detail),
            Self::Transport(message) => Some(message),
        }
    }

    /// Whether asking again could succeed without operator intervention.
    pub fn is_retriable(&self) -> bool {
        self.kind().is_retriable()
    }
}

/// Classification of LLM errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Missing credential - fatal to the action, needs a config change
    Configuration,
    /// Provider-reported failure - the user may retry
    UpstreamRejection,
    /// Network-level failure - the user may retry
    Transport,
}

impl LlmErrorKind {
    pub fn is_retriable(&self) -> bool {
        !matches!(self, LlmErrorKind::Configuration)
    }
}

impl std::fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmErrorKind::Configuration => write!(f, "Configuration error"),
            LlmErrorKind::UpstreamRejection => write!(f, "Upstream rejection"),
            LlmErrorKind::Transport => write!(f, "Transport error"),
        }
    }
}

/// Pull `error.message` out of an OpenAI-style error body.
fn provider_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let message = match value.get("error")? {
        serde_json::Value::String(s) => s.as_str(),
        other => other.get("message")?.as_str()?,
    };
    let message = message.trim();
    (!message.is_empty()).then(|| message.to_string())
}
