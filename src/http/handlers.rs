use super::state::AppState;
use crate::server::{CommandRequest, DeviceCommand};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use tracing::{error, info};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StreamStats {
    pub active_streams: usize,
}

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub device_id: String,
    pub command: String,
    pub status: String,
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

/// GET /devices
pub async fn list_devices(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.server.devices().snapshot())
}

/// GET /devices/:device_id
pub async fn get_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> impl IntoResponse {
    match state.server.devices().get(&device_id) {
        Some(device) => (StatusCode::OK, Json(device)).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("Device {} not found", device_id),
        ),
    }
}

/// GET /streams
/// Number of uploads still being reassembled
pub async fn stream_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(StreamStats {
        active_streams: state.server.reassembler().active_streams(),
    })
}

/// POST /devices/:device_id/command
pub async fn send_device_command(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Json(req): Json<CommandRequest>,
) -> impl IntoResponse {
    let command = match DeviceCommand::from_request(req) {
        Ok(command) => command,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    info!("Command '{}' requested for {}", command.name(), device_id);

    match state.server.send_command(&device_id, &command).await {
        Ok(()) => (
            StatusCode::OK,
            Json(CommandResponse {
                device_id,
                command: command.name().to_string(),
                status: "sent".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to send command: {}", e);
            error_response(
                StatusCode::BAD_GATEWAY,
                format!("Failed to send command: {}", e),
            )
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
