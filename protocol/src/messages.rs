//! JSON wire shapes crossing the presenter WebSocket and the viewer-facing
//! REST surface. Kept in `protocol` so `engine` (which builds these
//! payloads) and `server` (which parses/serves them) never drift apart.

use crate::event_type::EventType;
use crate::ids::{RoomId, ViewerId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Messages the server sends down the presenter WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PresenterOutbound {
    /// Sent immediately on connect when a brand new room was created.
    RoomCreated {
        room_id: RoomId,
        qr_code: String,
        web_url: String,
    },
    /// Sent immediately on connect when an existing room id was resumed.
    RoomReady {
        room_id: RoomId,
        qr_code: String,
        web_url: String,
    },
    /// An effect fired: a counter crossed its threshold.
    GameEvent {
        room_id: RoomId,
        event_type: EventType,
        trigger_count: i64,
        viewer_count: i64,
    },
    /// End-of-game aggregate summary.
    GameEndSummary {
        room_id: RoomId,
        #[serde(flatten)]
        summary: GameSummary,
    },
}

/// Messages the presenter client sends up. Only `type` is interpreted; any
/// other field is ignored, and unknown `type` values are ignored entirely.
#[derive(Debug, Clone, Deserialize)]
pub struct PresenterInbound {
    #[serde(rename = "type")]
    pub message_type: String,
}

impl PresenterInbound {
    pub fn is_game_end(&self) -> bool {
        self.message_type == "game_end"
    }
}

/// `(viewer_id, viewer_name, count)` triple used throughout the aggregation
/// results. `viewer_name` is `None` when the viewer never set one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewerCount {
    pub viewer_id: ViewerId,
    pub viewer_name: Option<String>,
    pub count: i64,
}

/// End-of-game aggregate, also the payload of `GET /api/rooms/:id/results`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSummary {
    pub event_totals: HashMap<EventType, i64>,
    pub viewer_totals: Vec<ViewerCount>,
    pub top_by_event: HashMap<EventType, Option<ViewerCount>>,
    pub top_overall: Option<(EventType, ViewerCount)>,
    pub ended_at: chrono::DateTime<chrono::Utc>,
}

/// `{viewer_id, viewer_name, counts, total}` — `GET`-able per-viewer recap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerSummary {
    pub viewer_id: ViewerId,
    pub viewer_name: Option<String>,
    pub counts: HashMap<EventType, i64>,
    pub total: i64,
}

/// A single entry of a batched `push_events` submission.
#[derive(Debug, Clone, Deserialize)]
pub struct PushEvent {
    pub button_name: String,
    pub push_count: u32,
}

/// Body of `POST /api/rooms/:id/events`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct EventRequest {
    pub event_type: Option<String>,
    pub button_name: Option<String>,
    pub viewer_id: Option<String>,
    #[serde(default)]
    pub push_events: Vec<PushEvent>,
}

/// Per-event-type result returned from a single press/batch submission.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EventResult {
    pub event_type: EventType,
    pub current_count: i64,
    pub required_count: i64,
    pub viewer_count: i64,
    pub effect_triggered: bool,
    pub next_threshold: i64,
}

/// Response of `POST /api/rooms/:id/events` when the room has already ended.
#[derive(Debug, Clone, Serialize)]
pub struct GameOverResponse {
    pub game_over: bool,
    pub viewer_summary: ViewerSummary,
}

/// One row of `GET /api/rooms/:id/stats`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatsEntry {
    pub event_type: EventType,
    pub current_count: i64,
    pub required_count: i64,
    pub next_threshold: i64,
    pub viewer_count: i64,
}

/// Body of `POST /api/viewers/set_name`.
#[derive(Debug, Clone, Deserialize)]
pub struct SetViewerNameRequest {
    pub viewer_id: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presenter_outbound_tags_by_type() {
        let msg = PresenterOutbound::GameEvent {
            room_id: RoomId::from("R1"),
            event_type: EventType::Helpful1,
            trigger_count: 7,
            viewer_count: 1,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "game_event");
        assert_eq!(json["room_id"], "R1");
        assert_eq!(json["event_type"], "helpful_1");
    }

    #[test]
    fn presenter_inbound_ignores_unknown_fields() {
        let parsed: PresenterInbound =
            serde_json::from_str(r#"{"type":"game_end","extra":123}"#).unwrap();
        assert!(parsed.is_game_end());
    }
}
