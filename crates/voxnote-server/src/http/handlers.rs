use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use voxnote_core::{AudioPayload, Config, ConfigPatch, CoreError, HistoryEntry};

use super::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub success: bool,
    pub config: Config,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub entries: Vec<HistoryEntry>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteHistoryRequest {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteHistoryResponse {
    pub success: bool,
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct SessionStateResponse {
    pub state: String,
}

fn error_response(err: CoreError) -> Response {
    let status = match err {
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::Validation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse { error: err.to_string() })).into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /config
pub async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    match state.config.get().await {
        Ok(config) => (StatusCode::OK, Json(config)).into_response(),
        Err(err) => {
            error!("failed to load config: {err}");
            error_response(err)
        }
    }
}

/// PUT /config: merge a partial config over the current one
pub async fn update_config(
    State(state): State<AppState>,
    Json(patch): Json<ConfigPatch>,
) -> impl IntoResponse {
    match state.config.update(patch).await {
        Ok(config) => (
            StatusCode::OK,
            Json(ConfigResponse {
                success: true,
                config,
            }),
        )
            .into_response(),
        Err(err) => {
            error!("failed to update config: {err}");
            error_response(err)
        }
    }
}

/// POST /config: restore the built-in defaults
pub async fn reset_config(State(state): State<AppState>) -> impl IntoResponse {
    match state.config.reset_to_default().await {
        Ok(config) => {
            info!("config reset to defaults");
            (
                StatusCode::OK,
                Json(ConfigResponse {
                    success: true,
                    config,
                }),
            )
                .into_response()
        }
        Err(err) => {
            error!("failed to reset config: {err}");
            error_response(err)
        }
    }
}

/// GET /history: all entries not soft-deleted, newest first
pub async fn list_history(State(state): State<AppState>) -> impl IntoResponse {
    let entries = state.history.list().await;
    (StatusCode::OK, Json(HistoryResponse { entries })).into_response()
}

/// DELETE /history: soft-delete one entry by id
pub async fn delete_history(
    State(state): State<AppState>,
    Json(req): Json<DeleteHistoryRequest>,
) -> impl IntoResponse {
    match state.history.soft_delete(&req.id).await {
        Ok(()) => {
            info!(id = %req.id, "history entry soft-deleted");
            (
                StatusCode::OK,
                Json(DeleteHistoryResponse {
                    success: true,
                    id: req.id,
                }),
            )
                .into_response()
        }
        Err(err) => error_response(err),
    }
}

/// POST /process: multipart upload of one audio field
pub async fn process_audio(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let payload = match read_audio_field(&mut multipart).await {
        Ok(payload) => payload,
        Err(err) => return error_response(err),
    };

    match state.orchestrator.process(payload).await {
        Ok(outcome) => {
            info!(id = %outcome.id, "processed uploaded audio");
            (StatusCode::OK, Json(outcome)).into_response()
        }
        Err(err) => {
            error!("processing failed: {err}");
            error_response(err)
        }
    }
}

async fn read_audio_field(multipart: &mut Multipart) -> Result<AudioPayload, CoreError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| CoreError::Validation(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| CoreError::Validation(format!("failed to read upload: {e}")))?;
        if data.is_empty() {
            return Err(CoreError::Validation("uploaded file is empty".to_string()));
        }
        return Ok(AudioPayload {
            data: data.to_vec(),
            mime_type,
        });
    }
    Err(CoreError::Validation("no file uploaded".to_string()))
}

/// POST /record/toggle: same toggle the hotkey uses
pub async fn toggle_recording(State(state): State<AppState>) -> impl IntoResponse {
    match state.session.toggle().await {
        Ok(session_state) => (
            StatusCode::OK,
            Json(SessionStateResponse {
                state: session_state.to_string(),
            }),
        )
            .into_response(),
        Err(err) => {
            error!("recording toggle failed: {err}");
            error_response(err)
        }
    }
}

/// GET /record/state
pub async fn session_state(State(state): State<AppState>) -> impl IntoResponse {
    Json(SessionStateResponse {
        state: state.session.current_state().to_string(),
    })
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
