//! The ask pipeline: prompt → relay → directive parser → synchronizer.
//!
//! A [`Studio`] owns the one editing [`Session`] and the relay. Only one ask
//! may be in flight at a time; the "thinking" flag is the gate. The session
//! lock is not held across the network call, so the editor stays usable
//! while the model works.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::directive;
use crate::llm::{LlmError, Role};
use crate::prompt::build_prompt;
use crate::relay::{HistoryMessage, Relay, RelayRequest};
use crate::workspace::{ApplyReport, Session};

#[derive(Debug, Error)]
pub enum StudioError {
    #[error("message is required")]
    EmptyMessage,

    #[error("the assistant is still working on the previous request")]
    Busy,

    #[error(transparent)]
    Relay(#[from] LlmError),
}

/// Result of one successful ask.
#[derive(Debug, Clone, Serialize)]
pub struct AskOutcome {
    /// Model that actually answered
    pub model: String,
    #[serde(flatten)]
    pub report: ApplyReport,
}

/// Session state plus the gate, as the UI sees it.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    #[serde(flatten)]
    pub session: Session,
    pub thinking: bool,
}

/// Holds the gate for the duration of one ask and releases it on drop.
struct ThinkingGuard<'a>(&'a AtomicBool);

impl<'a> ThinkingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for ThinkingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Studio {
    relay: Relay,
    session: RwLock<Session>,
    thinking: AtomicBool,
    /// Raw user requests and assistant replies, oldest first
    history: RwLock<Vec<HistoryMessage>>,
    history_turns: usize,
}

impl Studio {
    pub fn new(relay: Relay, session: Session) -> Self {
        Self {
            relay,
            session: RwLock::new(session),
            thinking: AtomicBool::new(false),
            history: RwLock::new(Vec::new()),
            history_turns: 0,
        }
    }

    /// Forward up to `turns` previous ask/reply pairs with each request.
    pub fn with_history_turns(mut self, turns: usize) -> Self {
        self.history_turns = turns;
        self
    }

    pub fn relay(&self) -> &Relay {
        &self.relay
    }

    pub fn session(&self) -> &RwLock<Session> {
        &self.session
    }

    pub fn is_thinking(&self) -> bool {
        self.thinking.load(Ordering::Acquire)
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session: self.session.read().await.clone(),
            thinking: self.is_thinking(),
        }
    }

    /// Run one request through the whole pipeline.
    ///
    /// Relay failures are written to the activity log before being returned.
    pub async fn ask(&self, message: &str, model: Option<String>) -> Result<AskOutcome, StudioError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(StudioError::EmptyMessage);
        }
        let _gate = ThinkingGuard::acquire(&self.thinking).ok_or(StudioError::Busy)?;

        let prompt = {
            let mut session = self.session.write().await;
            session.log_request(message);
            build_prompt(session.files(), message)
        };

        let request = RelayRequest {
            message: prompt,
            history: self.recent_history().await,
            model,
        };

        let reply = match self.relay.complete(request).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("Ask failed: {}", e);
                let line = match e.details() {
                    Some(details) => format!("{}: {}", e.summary(), details),
                    None => e.summary().to_string(),
                };
                self.session.write().await.log_failure(line);
                return Err(e.into());
            }
        };

        let directives = directive::parse(&reply.content);
        tracing::debug!(
            "Parsed {} directives from {} ({} chars)",
            directives.len(),
            reply.model,
            reply.content.len()
        );

        let report = self.session.write().await.apply(&directives);
        if !report.failures.is_empty() {
            tracing::warn!("{} directives skipped", report.failures.len());
        }

        self.remember(message, &reply.content).await;

        Ok(AskOutcome {
            model: reply.model,
            report,
        })
    }

    async fn recent_history(&self) -> Vec<HistoryMessage> {
        if self.history_turns == 0 {
            return Vec::new();
        }
        let history = self.history.read().await;
        let keep = self.history_turns.saturating_mul(2);
        history[history.len().saturating_sub(keep)..].to_vec()
    }

    async fn remember(&self, request: &str, reply: &str) {
        if self.history_turns == 0 {
            return;
        }
        let mut history = self.history.write().await;
        history.push(HistoryMessage {
            role: Role::User,
            content: request.to_string(),
        });
        history.push(HistoryMessage {
            role: Role::Assistant,
            content: reply.to_string(),
        });
        let excess = history.len().saturating_sub(self.history_turns.saturating_mul(2));
        history.drain(..excess);
    }
}
