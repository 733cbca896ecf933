//! # QwenStudio
//!
//! Backend for a browser code editor driven by a chat model.
//!
//! The model is asked to answer in a small directive language:
//!
//! ```text
//! @@edit:main.py@@
//! <full new content>
//! @@create:notes.md@@
//! <content>
//! @@log@@
//! <one-line summary>
//! ```
//!
//! ## Request Flow
//! 1. Render every workspace file plus the user's request into a prompt
//! 2. Relay it to OpenRouter (one call, no retry)
//! 3. Parse the reply into a [`DirectiveSet`]
//! 4. Apply the set to the in-memory [`Session`] and log the outcome
//!
//! ## Modules
//! - `directive`: reply parser
//! - `workspace`: in-memory files, editor buffer, activity log
//! - `relay` / `llm`: model selection and the OpenRouter client
//! - `studio`: single-flight ask pipeline
//! - `api`: HTTP endpoints

pub mod api;
pub mod config;
pub mod directive;
pub mod llm;
pub mod prompt;
pub mod relay;
pub mod studio;
pub mod workspace;

pub use config::Config;
pub use directive::{parse, Directive, DirectiveSet};
pub use relay::{ModelCatalog, Relay, RelayReply, RelayRequest};
pub use studio::Studio;
pub use workspace::Session;
