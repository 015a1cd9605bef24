//! `POST /api/rooms/:room_id/events` — the viewer-facing press endpoint.
//! Accepts either a single `event_type`/`button_name` press or a batched
//! `push_events` list, and fans each press through
//! [`engine::IngressPipeline::process_event`].

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use protocol::{EventRequest, EventResult, EventType, GameOverResponse, RoomId, ViewerId, MAX_PUSH_COUNT_PER_REQUEST};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub viewer_id: ViewerId,
    pub results: Vec<EventResult>,
}

fn resolve_event_type(token: &str) -> ApiResult<EventType> {
    EventType::from_str(token).map_err(|_| ApiError::bad_request(format!("unknown event type {token:?}")))
}

/// Flattens `EventRequest` into a `(event_type, push_count)` work list, per
/// spec §4.3: a single `event_type`/`button_name` field is one press; a
/// `push_events` batch carries its own per-entry counts.
fn plan_presses(body: &EventRequest) -> ApiResult<Vec<(EventType, i64)>> {
    if !body.push_events.is_empty() {
        let total: u32 = body.push_events.iter().map(|p| p.push_count).sum();
        if total > MAX_PUSH_COUNT_PER_REQUEST {
            return Err(ApiError::bad_request(format!(
                "total push count exceeds limit ({MAX_PUSH_COUNT_PER_REQUEST})"
            )));
        }
        return body
            .push_events
            .iter()
            .map(|p| Ok((resolve_event_type(&p.button_name)?, p.push_count as i64)))
            .collect();
    }

    let token = body
        .event_type
        .as_deref()
        .or(body.button_name.as_deref())
        .ok_or_else(|| ApiError::bad_request("missing event_type or button_name"))?;
    Ok(vec![(resolve_event_type(token)?, 1)])
}

pub async fn submit_events(
    Path(room_id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<EventRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let room_id = RoomId::from(room_id);
    let viewer_id = state.store.ensure_viewer_id(body.viewer_id.as_deref()).await?;

    let room = state
        .store
        .get_room(&room_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("room {room_id} does not exist")))?;

    if room.status == engine::RoomStatus::Ended {
        let viewer_summary = state.session.get_viewer_summary(&room_id, &viewer_id).await?;
        let response = GameOverResponse { game_over: true, viewer_summary };
        return Ok(Json(serde_json::to_value(response).expect("GameOverResponse always serializes")));
    }

    let presses = plan_presses(&body)?;
    let mut results = Vec::with_capacity(presses.len());
    for (event_type, count) in presses {
        let result = state.ingress.process_event(&room_id, &viewer_id, event_type, count).await?;
        results.push(result);
    }

    let response = EventsResponse { viewer_id, results };
    Ok(Json(serde_json::to_value(response).expect("EventsResponse always serializes")))
}
