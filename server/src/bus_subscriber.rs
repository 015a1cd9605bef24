//! Long-lived task that relays bus-published `GameEvent`s to whichever
//! presenter connection is registered locally for that room. Supervised by
//! a restart loop in `main`, mirroring the teacher's `cleanup_dead_rooms`
//! watchdog task — a `tokio::spawn`'d loop is this single-binary service's
//! process supervisor (spec §7).

use crate::state::AppState;
use protocol::{PresenterOutbound, GAME_EVENTS_CHANNEL};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const RESTART_BACKOFF: Duration = Duration::from_secs(2);

pub async fn run_supervised(state: Arc<AppState>, cancel: CancellationToken) {
    loop {
        if cancel.is_cancelled() {
            return;
        }
        let subscription_cancel = cancel.child_token();
        let state = state.clone();
        let result = state
            .bus
            .subscribe(
                GAME_EVENTS_CHANNEL,
                subscription_cancel,
                Box::new(move |payload| {
                    let state = state.clone();
                    tokio::spawn(async move {
                        dispatch(&state, payload).await;
                    });
                }),
            )
            .await;

        if let Err(err) = result {
            tracing::warn!(?err, "event bus subscription ended, restarting");
        }
        if cancel.is_cancelled() {
            return;
        }
        tokio::time::sleep(RESTART_BACKOFF).await;
    }
}

async fn dispatch(state: &Arc<AppState>, payload: bytes::Bytes) {
    let event: PresenterOutbound = match serde_json::from_slice(&payload) {
        Ok(event) => event,
        Err(err) => {
            tracing::warn!(?err, "discarding malformed game event payload");
            return;
        }
    };
    let PresenterOutbound::GameEvent { room_id, .. } = &event else {
        return;
    };
    if let Err(err) = state.presenters.send_event_to(room_id, payload).await {
        tracing::warn!(?err, room = %room_id, "failed to deliver game event to presenter");
    }
}
