//! API request and response types.

use serde::{Deserialize, Serialize};

use crate::studio::SessionSnapshot;
use crate::workspace::{AppliedWrite, ApplyFailure, LogEntry};

/// Error body shared by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Model used when a request names none (or an unknown one)
    pub default_model: String,

    /// Allowed models, default first
    pub models: Vec<String>,
}

/// Request to run one assistant round trip against the session.
#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
    pub message: String,

    /// Optional model override (uses default if not specified or not allowed)
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    /// Model that answered
    pub model: String,

    /// Log message for the batch (`Done.` if the reply had none)
    pub log: String,

    pub applied: Vec<AppliedWrite>,

    pub failures: Vec<ApplyFailure>,

    /// Session state after the directives were applied
    pub snapshot: SessionSnapshot,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFileRequest {
    pub path: String,

    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetActiveRequest {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BufferRequest {
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogResponse {
    pub entries: Vec<LogEntry>,
}
