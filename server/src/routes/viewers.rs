//! `POST /api/viewers/set_name` and `GET /api/rooms/:room_id/viewers/:viewer_id`
//! — viewer identity and per-viewer recap.

use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use protocol::{RoomId, SetViewerNameRequest, ViewerId, ViewerSummary};
use std::sync::Arc;

/// `GET /get_viewer_id` — mints (or, with a `?viewer_id=` query param,
/// confirms) an opaque viewer id without touching the display name.
pub async fn get_viewer_id(
    State(state): State<Arc<AppState>>,
    axum::extract::Query(query): axum::extract::Query<std::collections::HashMap<String, String>>,
) -> ApiResult<Json<serde_json::Value>> {
    let viewer_id = state.store.ensure_viewer_id(query.get("viewer_id").map(String::as_str)).await?;
    Ok(Json(serde_json::json!({ "viewer_id": viewer_id })))
}

pub async fn set_viewer_name(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SetViewerNameRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let viewer_id = ViewerId::from(body.viewer_id);
    state.store.set_viewer_name(&viewer_id, &body.name).await?;
    Ok(Json(serde_json::json!({ "viewer_id": viewer_id, "ok": true })))
}

pub async fn viewer_summary(
    Path((room_id, viewer_id)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ViewerSummary>> {
    let room_id = RoomId::from(room_id);
    let viewer_id = ViewerId::from(viewer_id);
    let summary = state.session.get_viewer_summary(&room_id, &viewer_id).await?;
    Ok(Json(summary))
}
