//! In-memory workspace and the synchronizer that applies directives to it.
//!
//! A [`Session`] owns the file map, the active file, the set of visited files,
//! the editor buffer for the active file, and the activity log. Every change
//! goes through a `Session` method; directive batches are computed against a
//! copy and swapped in whole.
//!
//! ## Invariants
//!
//! - The file map is never empty; deleting the last file is rejected.
//! - `active_file` is always a key of the file map.
//! - `open_files` is an insertion-ordered set of existing keys.
//! - The activity log only grows.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

use crate::directive::{Directive, DirectiveSet};

/// Path → content, in insertion order.
pub type FileMap = IndexMap<String, String>;

/// Logged when the assistant reply carried no log message.
pub const DEFAULT_DONE_MESSAGE: &str = "Done.";

const SEED_MAIN: &str = "def hello(name):\n    print(f\"Hello {name}\")\n\nhello(\"World\")";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkspaceError {
    #[error("Cannot delete the last remaining file")]
    LastFile,

    #[error("File not found: {0}")]
    UnknownFile(String),

    #[error("Invalid path: {0:?}")]
    InvalidPath(String),

    #[error("A workspace needs at least one file")]
    Empty,
}

/// Reject paths no consumer can store: blank, control characters, or
/// containing the directive delimiter.
pub fn validate_path(path: &str) -> Result<(), WorkspaceError> {
    if path.trim().is_empty() || path.chars().any(char::is_control) || path.contains("@@") {
        return Err(WorkspaceError::InvalidPath(path.to_string()));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Activity log
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    /// Direct user action (save, create, delete)
    User,
    /// The user's request to the assistant
    Prompt,
    /// Assistant round trip started
    Thinking,
    /// Changes applied from an assistant reply
    Ai,
    /// Relay failure or skipped directive
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: LogKind,
    pub text: String,
}

impl LogEntry {
    fn new(kind: LogKind, text: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            text: text.into(),
        }
    }
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Apply report
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WriteKind {
    Edit,
    Create,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AppliedWrite {
    pub path: String,
    pub kind: WriteKind,
}

/// A directive that was skipped; the rest of its batch still applied.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ApplyFailure {
    pub path: String,
    pub kind: WriteKind,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplyReport {
    /// Writes in the order they were applied
    pub applied: Vec<AppliedWrite>,
    pub failures: Vec<ApplyFailure>,
    /// Whether the editor buffer was replaced with new content
    pub buffer_refreshed: bool,
    /// Message appended to the activity log for this batch
    pub message: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    files: FileMap,
    active_file: String,
    open_files: Vec<String>,
    buffer: String,
    log: Vec<LogEntry>,
}

impl Default for Session {
    fn default() -> Self {
        Self::seeded()
    }
}

impl Session {
    /// Session over `files`, with the first file active.
    pub fn new(files: FileMap) -> Result<Self, WorkspaceError> {
        let (first, content) = files.first().ok_or(WorkspaceError::Empty)?;
        let active_file = first.clone();
        let buffer = content.clone();
        Ok(Self {
            open_files: vec![active_file.clone()],
            active_file,
            buffer,
            files,
            log: Vec::new(),
        })
    }

    /// The startup workspace: `main.py` with a greeting and an empty `utils.py`.
    pub fn seeded() -> Self {
        let mut files = FileMap::new();
        files.insert("main.py".to_string(), SEED_MAIN.to_string());
        files.insert("utils.py".to_string(), String::new());
        Self {
            buffer: SEED_MAIN.to_string(),
            active_file: "main.py".to_string(),
            open_files: vec!["main.py".to_string()],
            files,
            log: Vec::new(),
        }
    }

    pub fn files(&self) -> &FileMap {
        &self.files
    }

    pub fn file(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    pub fn active_file(&self) -> &str {
        &self.active_file
    }

    pub fn open_files(&self) -> &[String] {
        &self.open_files
    }

    /// Editor-facing content of the active file, including unsaved edits.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    // ── Directive synchronizer ──────────────────────────────────────────────

    /// Compute the state that results from applying `directives`, without
    /// touching `self`.
    ///
    /// Writes are applied in appearance order, so the last directive naming a
    /// path decides its content whether it was an edit or a create. The buffer
    /// is refreshed only when the active file was written; otherwise unsaved
    /// editor content is left alone.
    pub fn with_directives(&self, directives: &DirectiveSet) -> (Session, ApplyReport) {
        let mut next = self.clone();
        let mut report = ApplyReport::default();
        let mut active_written = false;

        for directive in directives.mutations() {
            let Some((path, content)) = directive.as_write() else {
                continue;
            };
            let kind = match directive {
                Directive::Create { .. } => WriteKind::Create,
                _ => WriteKind::Edit,
            };

            if let Err(e) = validate_path(path) {
                tracing::warn!("Skipping {} directive: {}", directive.verb(), e);
                report.failures.push(ApplyFailure {
                    path: path.to_string(),
                    kind,
                    reason: e.to_string(),
                });
                continue;
            }

            next.files.insert(path.to_string(), content.to_string());
            active_written |= path == next.active_file;
            report.applied.push(AppliedWrite {
                path: path.to_string(),
                kind,
            });
        }

        if active_written {
            if let Some(content) = next.files.get(&next.active_file) {
                next.buffer = content.clone();
                report.buffer_refreshed = true;
            }
        }

        for failure in &report.failures {
            next.push_log(
                LogKind::Error,
                format!("❌ Skipped {:?}: {}", failure.path, failure.reason),
            );
        }

        report.message = directives
            .log()
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_DONE_MESSAGE)
            .to_string();
        next.push_log(LogKind::Ai, format!("✅ {}", report.message));

        (next, report)
    }

    /// Apply a directive batch in place. See [`Session::with_directives`].
    pub fn apply(&mut self, directives: &DirectiveSet) -> ApplyReport {
        let (next, report) = self.with_directives(directives);
        *self = next;
        report
    }

    // ── User actions ────────────────────────────────────────────────────────

    /// Add a new file and make it active. Returns `false` without changes if
    /// the path already exists.
    pub fn create_file(&mut self, path: &str, content: &str) -> Result<bool, WorkspaceError> {
        validate_path(path)?;
        if self.files.contains_key(path) {
            return Ok(false);
        }
        self.files.insert(path.to_string(), content.to_string());
        self.activate(path);
        self.push_log(LogKind::User, format!("📄 Created {}", path));
        Ok(true)
    }

    /// Remove a file. The last remaining file cannot be deleted. If the active
    /// file goes away, the first remaining file becomes active.
    pub fn delete_file(&mut self, path: &str) -> Result<(), WorkspaceError> {
        if !self.files.contains_key(path) {
            return Err(WorkspaceError::UnknownFile(path.to_string()));
        }
        if self.files.len() <= 1 {
            return Err(WorkspaceError::LastFile);
        }

        self.files.shift_remove(path);
        self.open_files.retain(|p| p != path);
        if self.active_file == path {
            if let Some(first) = self.files.keys().next().cloned() {
                self.activate(&first);
            }
        }
        self.push_log(LogKind::User, format!("🗑️ Deleted {}", path));
        Ok(())
    }

    /// Show `path` in the editor. Unsaved buffer content is discarded.
    pub fn set_active_file(&mut self, path: &str) -> Result<(), WorkspaceError> {
        if !self.files.contains_key(path) {
            return Err(WorkspaceError::UnknownFile(path.to_string()));
        }
        self.activate(path);
        Ok(())
    }

    /// Replace the editor buffer. The file map is untouched until [`Session::save`].
    pub fn set_buffer(&mut self, content: impl Into<String>) {
        self.buffer = content.into();
    }

    /// Write the buffer into the active file.
    pub fn save(&mut self) -> &str {
        self.files
            .insert(self.active_file.clone(), self.buffer.clone());
        self.push_log(LogKind::User, format!("💾 Saved {}", self.active_file));
        &self.active_file
    }

    // ── Pipeline log hooks ──────────────────────────────────────────────────

    /// Record that a request was sent to the assistant.
    pub fn log_request(&mut self, request: &str) {
        self.push_log(LogKind::Thinking, "🧠 Qwen is thinking...");
        self.push_log(LogKind::Prompt, format!("> {}", request.trim()));
    }

    /// Record a failed assistant round trip.
    pub fn log_failure(&mut self, message: impl std::fmt::Display) {
        self.push_log(LogKind::Error, format!("❌ {}", message));
    }

    fn activate(&mut self, path: &str) {
        self.active_file = path.to_string();
        self.buffer = self.files.get(path).cloned().unwrap_or_default();
        if !self.open_files.iter().any(|p| p == path) {
            self.open_files.push(path.to_string());
        }
    }

    fn push_log(&mut self, kind: LogKind, text: impl Into<String>) {
        self.log.push(LogEntry::new(kind, text));
    }
}
