//! HTTP API for QwenStudio.
//!
//! ## Endpoints
//!
//! - `GET /api/health` - Health check and model allow-list
//! - `POST /api/qwen` - Relay one message to the provider, return the raw reply
//! - `GET /api/session` - Snapshot of the editing session
//! - `POST /api/session/ask` - Run a request through the model and apply its directives
//! - `POST /api/session/files` - Create a file
//! - `DELETE /api/session/files/*path` - Delete a file
//! - `POST /api/session/active` - Switch the active file
//! - `PUT /api/session/buffer` - Replace the editor buffer
//! - `POST /api/session/save` - Write the buffer into the active file
//! - `GET /api/session/log` - Activity log

mod relay;
mod routes;
mod session;
pub mod types;

pub use routes::{router, serve, AppState};
pub use types::*;
