//! Room listing and inspection endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::room::{RoomInfo, RoomSummary};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct RoomListResponse {
    pub rooms: Vec<RoomSummary>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct RoomIdResponse {
    pub room_id: String,
    /// Path a client connects to after choosing a display name
    pub ws_path: String,
}

/// GET /api/v1/rooms
pub async fn list_rooms(State(state): State<AppState>) -> Json<RoomListResponse> {
    let rooms = state.relay.registry.list_rooms();
    let total = rooms.len();
    Json(RoomListResponse { rooms, total })
}

/// GET /api/v1/rooms/{room_id}
pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomInfo>> {
    state
        .relay
        .registry
        .room_info(&room_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Room '{}' not found", room_id)))
}

/// POST /api/v1/rooms - mint a fresh room id.
///
/// The room itself only exists once someone joins it.
pub async fn create_room_id() -> (StatusCode, Json<RoomIdResponse>) {
    let room_id = Uuid::new_v4().to_string();
    let ws_path = format!("/ws/{}/{{username}}", room_id);
    (StatusCode::CREATED, Json(RoomIdResponse { room_id, ws_path }))
}
