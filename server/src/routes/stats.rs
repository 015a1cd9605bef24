//! `GET /api/rooms/:room_id/stats` — live per-event-type counter snapshot,
//! independent of the end-of-game aggregate in `results`.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use engine::counter_store::active_viewers_clamped;
use protocol::{threshold_for, EventType, RoomId, StatsEntry};
use std::sync::Arc;

pub async fn room_stats(
    Path(room_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<StatsEntry>>> {
    let room_id = RoomId::from(room_id);
    state
        .store
        .get_room(&room_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("room {room_id} does not exist")))?;

    let viewer_count = active_viewers_clamped(state.counters.as_ref(), &room_id).await;

    let mut entries = Vec::with_capacity(EventType::ALL.len());
    for event_type in EventType::ALL {
        let current_count = state.counters.get(&room_id, event_type).await?;
        let required_count = threshold_for(event_type, viewer_count);
        entries.push(StatsEntry {
            event_type,
            current_count,
            required_count,
            next_threshold: required_count,
            viewer_count,
        });
    }
    Ok(Json(entries))
}
