//! Presenter WebSocket: handshake, registry wiring, and read loop. Mirrors
//! the teacher's `hand_shake.rs`/`processing_module.rs` split — handshake
//! decides whether a room is created or resumed, then a loop reads
//! control messages until the presenter ends the game or disconnects —
//! but the wire format is JSON (spec'd), not the teacher's postcard framing.

use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use engine::{EngineError, PresenterSink};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use protocol::{PresenterInbound, PresenterOutbound, RoomId};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Deserialize)]
pub struct PresenterConnectQuery {
    pub room_id: Option<String>,
}

pub async fn presenter_ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<PresenterConnectQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| presenter_connection(socket, query, state))
}

struct WebSocketSink {
    sender: Mutex<SplitSink<WebSocket, Message>>,
}

#[async_trait::async_trait]
impl PresenterSink for WebSocketSink {
    async fn send(&self, payload: bytes::Bytes) -> Result<(), EngineError> {
        let text = String::from_utf8(payload.to_vec()).map_err(|e| EngineError::BusError(e.to_string()))?;
        self.sender
            .lock()
            .await
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| EngineError::BusError(e.to_string()))
    }
}

async fn presenter_connection(socket: WebSocket, query: PresenterConnectQuery, state: Arc<AppState>) {
    let (sender, mut receiver) = socket.split();
    let sink: Arc<WebSocketSink> = Arc::new(WebSocketSink { sender: Mutex::new(sender) });

    let (room_id, greeting) = match establish_room(&state, query.room_id).await {
        Ok(pair) => pair,
        Err(err) => {
            tracing::error!(?err, "presenter handshake failed");
            return;
        }
    };

    if sink.send(encode(&greeting)).await.is_err() {
        return;
    }

    state.presenters.register_with(room_id.clone(), sink.clone() as Arc<dyn PresenterSink>);

    while let Some(frame) = receiver.next().await {
        let Ok(frame) = frame else { break };
        let Message::Text(text) = frame else { continue };
        let Ok(inbound) = serde_json::from_str::<PresenterInbound>(&text) else { continue };
        if inbound.is_game_end() {
            match state.session.end_game(&room_id).await {
                Ok(summary) => {
                    let message = PresenterOutbound::GameEndSummary { room_id: room_id.clone(), summary };
                    let _ = sink.send(encode(&message)).await;
                }
                Err(err) => tracing::error!(?err, room = %room_id, "end_game failed"),
            }
            break;
        }
    }

    state.presenters.unregister(&room_id, &(sink as Arc<dyn PresenterSink>));
}

async fn establish_room(
    state: &Arc<AppState>,
    requested_room_id: Option<String>,
) -> Result<(RoomId, PresenterOutbound), EngineError> {
    match requested_room_id {
        Some(id) if !id.is_empty() => {
            let room_id = RoomId::from(id);
            state.store.create_room_if_absent(&room_id, "presenter").await?;
            let web_url = state.viewer_join_url(&room_id);
            let greeting = PresenterOutbound::RoomReady { room_id: room_id.clone(), qr_code: web_url.clone(), web_url };
            Ok((room_id, greeting))
        }
        _ => {
            let room_id = RoomId::from(engine::generate_id());
            state.store.create_room_if_absent(&room_id, "presenter").await?;
            let web_url = state.viewer_join_url(&room_id);
            let greeting = PresenterOutbound::RoomCreated { room_id: room_id.clone(), qr_code: web_url.clone(), web_url };
            Ok((room_id, greeting))
        }
    }
}

fn encode(message: &PresenterOutbound) -> bytes::Bytes {
    serde_json::to_vec(message).expect("PresenterOutbound always serializes").into()
}
