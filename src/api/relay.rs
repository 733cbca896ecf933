//! Stateless relay endpoint (`/api/qwen`).
//!
//! Forwards one message to the provider and returns the raw reply. Directive
//! parsing is left to the caller.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

use crate::llm::LlmError;
use crate::relay::{RelayReply, RelayRequest};

use super::routes::AppState;
use super::types::ErrorBody;

pub(crate) fn error_response(status: StatusCode, body: ErrorBody) -> Response {
    (status, Json(body)).into_response()
}

/// Map a relay failure to its JSON body. Every kind carries the summary as
/// `error`; rejections and transport failures add the detail.
pub(crate) fn relay_error_body(err: &LlmError) -> ErrorBody {
    match err.details() {
        Some(details) => ErrorBody::with_details(err.summary(), details),
        None => ErrorBody::new(err.summary()),
    }
}

/// `POST /api/qwen`
pub async fn relay(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RelayRequest>,
) -> Result<Json<RelayReply>, Response> {
    state
        .studio
        .relay()
        .complete(req)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!(
                "Relay request failed ({}, retriable={}): {}",
                e.kind(),
                e.is_retriable(),
                e
            );
            error_response(StatusCode::INTERNAL_SERVER_ERROR, relay_error_body(&e))
        })
}

/// Any method other than POST on the relay path.
pub async fn method_not_allowed() -> Response {
    error_response(
        StatusCode::METHOD_NOT_ALLOWED,
        ErrorBody::new("Method not allowed"),
    )
}
