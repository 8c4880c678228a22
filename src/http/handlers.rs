use super::state::AppState;
use crate::audio::CaptureError;
use crate::live::LiveError;
use crate::session::SessionStatus;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session_id: Uuid,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StopSessionResponse {
    pub status: String,
    pub message: String,
    pub session: SessionStatus,
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub session_id: Option<Uuid>,
    pub transcript: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /voice/start
/// Start a voice session; any session still live is stopped first
pub async fn start_session(State(state): State<AppState>) -> impl IntoResponse {
    info!("Voice session start requested");

    match state.controller.start().await {
        Ok(session_id) => (
            StatusCode::OK,
            Json(StartSessionResponse {
                session_id,
                status: "open".to_string(),
                message: "Voice session started".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to start voice session: {}", e);
            (
                error_status(&e),
                Json(ErrorResponse {
                    error: format!("Failed to start voice session: {}", e),
                }),
            )
                .into_response()
        }
    }
}

/// POST /voice/stop
/// Stop the current voice session; stopping twice is harmless
pub async fn stop_session(State(state): State<AppState>) -> impl IntoResponse {
    info!("Voice session stop requested");

    let session = state.controller.stop().await;
    (
        StatusCode::OK,
        Json(StopSessionResponse {
            status: session.state.to_string(),
            message: "Voice session stopped".to_string(),
            session,
        }),
    )
        .into_response()
}

/// GET /voice/status
/// Get the current session status
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.controller.status().await;
    (StatusCode::OK, Json(status)).into_response()
}

/// GET /voice/transcript
/// Get the transcript accumulated so far
pub async fn get_transcript(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.controller.status().await;
    let transcript = state.controller.transcript().await;
    (
        StatusCode::OK,
        Json(TranscriptResponse {
            session_id: status.session_id,
            transcript,
        }),
    )
        .into_response()
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Map a start failure to a response status
fn error_status(e: &anyhow::Error) -> StatusCode {
    if let Some(capture) = e.downcast_ref::<CaptureError>() {
        return match capture {
            CaptureError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::SERVICE_UNAVAILABLE,
        };
    }
    if e.downcast_ref::<LiveError>().is_some() {
        return StatusCode::BAD_GATEWAY;
    }
    StatusCode::INTERNAL_SERVER_ERROR
}
