pub mod events;
pub mod results;
pub mod stats;
pub mod viewers;

use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws-unity", get(crate::ws::presenter_ws_handler))
        .route("/api/rooms/{room_id}/events", post(events::submit_events))
        .route("/api/rooms/{room_id}/stats", get(stats::room_stats))
        .route("/api/rooms/{room_id}/results", get(results::room_results))
        .route("/api/rooms/{room_id}/viewers/{viewer_id}", get(viewers::viewer_summary))
        .route("/get_viewer_id", get(viewers::get_viewer_id))
        .route("/api/viewers/set_name", post(viewers::set_viewer_name))
}
