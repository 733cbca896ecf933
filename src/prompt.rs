//! Prompt sent to the model for one ask.
//!
//! The whole workspace goes into every prompt; the model has no other view
//! of the files.

use crate::workspace::FileMap;

/// Instruction block that teaches the model the directive markers.
const PREAMBLE: &str = "You are Qwen3, an AI coding assistant.
Use this format:
@@edit:filename@@
<new content>
@@create:filename@@
<content>
@@log@@
<message>";

/// Render every workspace file as a labelled section, separated by blank lines.
pub fn files_context(files: &FileMap) -> String {
    files
        .iter()
        .map(|(path, content)| format!("--- FILE: {} ---\n{}", path, content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Build the full prompt: directive instructions, all files, then the request.
pub fn build_prompt(files: &FileMap, request: &str) -> String {
    format!(
        "{}\n\nAvailable files:\n{}\n\nUser request:\n{}\n\nRespond ONLY with @@edit@@ / @@create@@ / @@log@@.\n",
        PREAMBLE,
        files_context(files),
        request.trim()
    )
}
