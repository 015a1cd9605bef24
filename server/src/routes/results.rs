//! `GET /api/rooms/:room_id/results` — the final aggregate summary. Only
//! meaningful once the room has ended (spec §6); a still-active room has
//! no final results yet, so the route reports 409 rather than a
//! misleadingly-final-looking snapshot.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use engine::RoomStatus;
use protocol::{GameSummary, RoomId};
use std::sync::Arc;

pub async fn room_results(
    Path(room_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<GameSummary>> {
    let room_id = RoomId::from(room_id);
    let room = state
        .store
        .get_room(&room_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("room {room_id} does not exist")))?;

    if room.status != RoomStatus::Ended {
        return Err(ApiError::new(StatusCode::CONFLICT, "room has not ended yet"));
    }

    let summary = state.session.snapshot(&room_id).await?;
    Ok(Json(summary))
}
