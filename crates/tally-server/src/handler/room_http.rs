use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use tally_core::{Room, RoomId};

use crate::AppState;
use crate::error::ServerError;

/// Read-only view of a room, as served by `GET /rooms/{room_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomView {
    pub version: u64,
    pub room: Room,
}

pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomView>, ServerError> {
    let room_id: RoomId = room_id.parse()?;
    let handle = state
        .registry
        .get(&room_id)
        .ok_or(ServerError::RoomNotFound)?;
    // Only empty rooms retire, so a closed actor reads as not found.
    let (version, room) = handle.snapshot().await.map_err(|err| match err {
        ServerError::RoomClosed => ServerError::RoomNotFound,
        other => other,
    })?;
    if !room.exists() {
        return Err(ServerError::RoomNotFound);
    }
    Ok(Json(RoomView { version, room }))
}

pub async fn health() -> &'static str {
    "ok"
}
