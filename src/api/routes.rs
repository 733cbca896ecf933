//! Router construction and server startup.

use std::sync::Arc;

use axum::{
    extract::State,
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::relay::Relay;
use crate::studio::Studio;
use crate::workspace::Session;

use super::relay as relay_api;
use super::session as session_api;
use super::types::HealthResponse;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// The editing session and the relay behind it
    pub studio: Studio,
}

impl AppState {
    pub fn new(config: Config, studio: Studio) -> Self {
        Self { config, studio }
    }

    /// State with the OpenRouter relay and the seeded workspace.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let relay = Relay::from_config(&config)?;
        let studio =
            Studio::new(relay, Session::seeded()).with_history_turns(config.history_turns);
        Ok(Self::new(config, studio))
    }
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route(
            "/api/qwen",
            post(relay_api::relay).fallback(relay_api::method_not_allowed),
        )
        .route("/api/session", get(session_api::get_session))
        .route("/api/session/ask", post(session_api::ask))
        .route("/api/session/files", post(session_api::create_file))
        .route("/api/session/files/*path", delete(session_api::delete_file))
        .route("/api/session/active", post(session_api::set_active))
        .route("/api/session/buffer", put(session_api::set_buffer))
        .route("/api/session/save", post(session_api::save))
        .route("/api/session/log", get(session_api::get_log))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    if config.api_key.is_none() {
        tracing::warn!("OPENROUTER_API_KEY is not set; relay requests will fail");
    }

    let state = Arc::new(AppState::from_config(config)?);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let catalog = state.studio.relay().catalog();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        default_model: catalog.default_model().to_string(),
        models: catalog.models().to_vec(),
    })
}
