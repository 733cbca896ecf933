//! Session endpoints: the editor's view of the workspace and the ask pipeline.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Json, Response},
};

use crate::studio::{SessionSnapshot, StudioError};
use crate::workspace::WorkspaceError;

use super::relay::{error_response, relay_error_body};
use super::routes::AppState;
use super::types::{
    AskRequest, AskResponse, BufferRequest, CreateFileRequest, ErrorBody, LogResponse,
    SetActiveRequest,
};

fn workspace_error(err: WorkspaceError) -> Response {
    let status = match err {
        WorkspaceError::UnknownFile(_) => StatusCode::NOT_FOUND,
        WorkspaceError::LastFile => StatusCode::CONFLICT,
        WorkspaceError::InvalidPath(_) | WorkspaceError::Empty => StatusCode::BAD_REQUEST,
    };
    error_response(status, ErrorBody::new(err.to_string()))
}

fn studio_error(err: StudioError) -> Response {
    match err {
        StudioError::EmptyMessage => {
            error_response(StatusCode::BAD_REQUEST, ErrorBody::new(err.to_string()))
        }
        StudioError::Busy => error_response(StatusCode::CONFLICT, ErrorBody::new(err.to_string())),
        StudioError::Relay(e) => error_response(StatusCode::BAD_GATEWAY, relay_error_body(&e)),
    }
}

/// `GET /api/session`
pub async fn get_session(State(state): State<Arc<AppState>>) -> Json<SessionSnapshot> {
    Json(state.studio.snapshot().await)
}

/// `POST /api/session/ask`
pub async fn ask(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, Response> {
    let outcome = state
        .studio
        .ask(&req.message, req.model)
        .await
        .map_err(studio_error)?;

    tracing::info!(
        "Applied {} writes from {} ({} skipped)",
        outcome.report.applied.len(),
        outcome.model,
        outcome.report.failures.len()
    );

    Ok(Json(AskResponse {
        model: outcome.model,
        log: outcome.report.message,
        applied: outcome.report.applied,
        failures: outcome.report.failures,
        snapshot: state.studio.snapshot().await,
    }))
}

/// `POST /api/session/files`
///
/// Returns 201 when the file was created, 200 when it already existed (the
/// existing content is kept).
pub async fn create_file(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateFileRequest>,
) -> Result<(StatusCode, Json<SessionSnapshot>), Response> {
    let created = state
        .studio
        .session()
        .write()
        .await
        .create_file(&req.path, &req.content)
        .map_err(workspace_error)?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(state.studio.snapshot().await)))
}

/// `DELETE /api/session/files/*path`
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<Json<SessionSnapshot>, Response> {
    state
        .studio
        .session()
        .write()
        .await
        .delete_file(&path)
        .map_err(workspace_error)?;
    Ok(Json(state.studio.snapshot().await))
}

/// `POST /api/session/active`
pub async fn set_active(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SetActiveRequest>,
) -> Result<Json<SessionSnapshot>, Response> {
    state
        .studio
        .session()
        .write()
        .await
        .set_active_file(&req.path)
        .map_err(workspace_error)?;
    Ok(Json(state.studio.snapshot().await))
}

/// `PUT /api/session/buffer`
pub async fn set_buffer(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BufferRequest>,
) -> Json<SessionSnapshot> {
    state.studio.session().write().await.set_buffer(req.content);
    Json(state.studio.snapshot().await)
}

/// `POST /api/session/save`
pub async fn save(State(state): State<Arc<AppState>>) -> Json<SessionSnapshot> {
    {
        let mut session = state.studio.session().write().await;
        let path = session.save();
        tracing::debug!("Saved buffer to {}", path);
    }
    Json(state.studio.snapshot().await)
}

/// `GET /api/session/log`
pub async fn get_log(State(state): State<Arc<AppState>>) -> Json<LogResponse> {
    Json(LogResponse {
        entries: state.studio.session().read().await.log().to_vec(),
    })
}
