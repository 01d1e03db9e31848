use axum::{
    extract::{Path, State, WebSocketUpgrade},
    response::Response,
};

use crate::error::AppError;
use crate::server::AppState;

use super::connection::WsConnection;

const MAX_ROOM_ID_LEN: usize = 128;
const MAX_DISPLAY_NAME_LEN: usize = 64;

/// WebSocket upgrade handler for `/ws/{room_id}/{username}`
#[tracing::instrument(name = "ws.upgrade", skip(ws, state))]
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path((room_id, username)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let room_id = validate_identifier("room id", &room_id, MAX_ROOM_ID_LEN)?;
    let username = validate_identifier("username", &username, MAX_DISPLAY_NAME_LEN)?;

    tracing::info!(room_id = %room_id, username = %username, "WebSocket upgrade requested");

    let relay = state.relay.clone();
    Ok(ws.on_upgrade(move |socket| async move {
        let summary = relay
            .session(WsConnection::new(socket), room_id, username)
            .run()
            .await;

        tracing::debug!(
            connection_id = %summary.connection_id,
            reason = ?summary.close_reason,
            "WebSocket session finished"
        );
    }))
}

/// Trim and check a path segment; returns the trimmed value
fn validate_identifier(field: &str, value: &str, max_len: usize) -> Result<String, AppError> {
    let value = value.trim();

    if value.is_empty() {
        return Err(AppError::Validation(format!("{} must not be empty", field)));
    }
    if value.chars().count() > max_len {
        return Err(AppError::Validation(format!(
            "{} must be at most {} characters",
            field, max_len
        )));
    }
    if value.chars().any(char::is_control) {
        return Err(AppError::Validation(format!(
            "{} must not contain control characters",
            field
        )));
    }

    Ok(value.to_string())
}
