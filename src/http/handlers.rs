use super::state::AppState;
use crate::session::{SessionConfig, SessionDiagnostics, SessionInfo, StartError, StopError};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use tracing::info;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session: SessionInfo,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct StopSessionResponse {
    pub session_id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ActiveSessionResponse {
    pub session: Option<SessionInfo>,
}

#[derive(Debug, Serialize)]
pub struct DiagnosticsResponse {
    pub diagnostics: SessionDiagnostics,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: String) -> axum::response::Response {
    (status, Json(ErrorResponse { error })).into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /sessions/start
/// Start a new call-assist session
pub async fn start_session(
    State(state): State<AppState>,
    Json(config): Json<SessionConfig>,
) -> impl IntoResponse {
    info!("Starting call-assist session ({:?})", config.mode);

    match state.registry.start(config).await {
        Ok(session) => (
            StatusCode::OK,
            Json(StartSessionResponse {
                session,
                status: "open".to_string(),
            }),
        )
            .into_response(),
        Err(e @ StartError::AlreadyActive) => {
            error_response(StatusCode::CONFLICT, e.to_string())
        }
        Err(e @ StartError::InvalidConfig(_)) => {
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e @ StartError::ConnectFailed(_)) => {
            error_response(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

/// POST /sessions/stop/:session_id
/// Gracefully stop a session
pub async fn stop_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    info!("Stopping session: {}", session_id);

    match state.registry.stop(&session_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(StopSessionResponse {
                session_id,
                status: "stopped".to_string(),
            }),
        )
            .into_response(),
        Err(e @ StopError::NotFound) => error_response(StatusCode::NOT_FOUND, e.to_string()),
    }
}

/// GET /sessions/active
/// The currently active session, if any
pub async fn get_active_session(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(ActiveSessionResponse {
            session: state.registry.get_active(),
        }),
    )
}

/// POST /sessions/:session_id/audio
/// One-way push of a raw PCM frame (binary body)
pub async fn push_audio(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    body: Bytes,
) -> impl IntoResponse {
    state.registry.send_audio(&session_id, body.to_vec());
    StatusCode::ACCEPTED
}

/// GET /sessions/:session_id/diagnostics
/// Session counters (frames, drops, utterances)
pub async fn get_diagnostics(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.registry.diagnostics(&session_id) {
        Some(diagnostics) => {
            (StatusCode::OK, Json(DiagnosticsResponse { diagnostics })).into_response()
        }
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("Session {} not found", session_id),
        ),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
