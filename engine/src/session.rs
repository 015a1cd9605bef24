//! End-of-game aggregation and per-viewer recap, the read side that mirrors
//! [`crate::ingress::IngressPipeline`] on the write side.

use crate::counter_store::{CounterStore, SharedCounterStore};
use crate::error::EngineError;
use crate::store::{DurableStore, RoomStatus};
use chrono::Utc;
use protocol::{EventType, GameSummary, RoomId, ViewerCount, ViewerId, ViewerSummary};
use std::sync::Arc;

/// Picks the leading `(event_type, viewer_id, viewer_name, count)` row
/// between `best` and `row`: greater count wins, and a tied count is broken
/// by the smaller `viewer_id` string, matching the original service's
/// room-summary comparator. Unlike `Iterator::max_by_key`, this never lets
/// iteration order decide a tie.
fn pick_leader<'a>(
    best: Option<&'a (EventType, ViewerId, Option<String>, i64)>,
    row: &'a (EventType, ViewerId, Option<String>, i64),
) -> Option<&'a (EventType, ViewerId, Option<String>, i64)> {
    match best {
        None => Some(row),
        Some(current) if row.3 > current.3 || (row.3 == current.3 && row.1 < current.1) => Some(row),
        Some(current) => Some(current),
    }
}

pub struct SessionService {
    store: Arc<dyn DurableStore>,
    counters: SharedCounterStore,
}

impl SessionService {
    pub fn new(store: Arc<dyn DurableStore>, counters: SharedCounterStore) -> Self {
        Self { store, counters }
    }

    /// Ends `room` if it is still active and returns the final summary.
    /// Idempotent: a room already marked ended returns the same summary it
    /// would have returned the first time, computed from the same event
    /// log rather than from a cached copy, so it stays correct even if
    /// called from multiple instances racing each other (spec §9).
    pub async fn end_game(&self, room: &RoomId) -> Result<GameSummary, EngineError> {
        let existing = self
            .store
            .get_room(room)
            .await?
            .ok_or_else(|| EngineError::RoomNotFound(room.to_string()))?;

        let just_ended = existing.status == RoomStatus::Active;
        if just_ended {
            self.store.mark_room_ended(room, Utc::now()).await?;
        }

        let ended_at = self
            .store
            .get_room(room)
            .await?
            .and_then(|r| r.ended_at)
            .unwrap_or_else(Utc::now);

        let summary = self.build_summary(room, ended_at).await?;

        // Only the transitioning call resets counters — a replayed end_game
        // on an already-ended room must stay a pure read (idempotence).
        if just_ended {
            for ty in EventType::ALL {
                if let Err(err) = self.counters.reset(room, ty).await {
                    tracing::warn!(?err, room = %room, ty = %ty, "counter reset on game end failed");
                }
            }
        }

        Ok(summary)
    }

    /// A point-in-time summary usable whether or not the room has ended.
    /// For an active room, `ended_at` reflects "as of now", not a
    /// recorded end time — callers must check the room's status
    /// separately if they need to distinguish a live snapshot from a
    /// final one.
    pub async fn snapshot(&self, room: &RoomId) -> Result<GameSummary, EngineError> {
        let room_state = self
            .store
            .get_room(room)
            .await?
            .ok_or_else(|| EngineError::RoomNotFound(room.to_string()))?;
        let ended_at = room_state.ended_at.unwrap_or_else(Utc::now);
        self.build_summary(room, ended_at).await
    }

    async fn build_summary(&self, room: &RoomId, ended_at: chrono::DateTime<Utc>) -> Result<GameSummary, EngineError> {
        let event_totals = self.store.totals_by_event(room).await?;
        let viewer_totals_raw = self.store.totals_by_viewer(room).await?;
        let viewer_totals: Vec<ViewerCount> = viewer_totals_raw
            .into_iter()
            .map(|(viewer_id, viewer_name, count)| ViewerCount { viewer_id, viewer_name, count })
            .collect();

        let per_event = self.store.counts_by_event_and_viewer(room).await?;
        let mut top_by_event = std::collections::HashMap::new();
        for ty in EventType::ALL {
            let best = per_event
                .iter()
                .filter(|(t, ..)| *t == ty)
                .fold(None, |best, row| pick_leader(best, row))
                .map(|(_, viewer_id, viewer_name, count)| ViewerCount {
                    viewer_id: viewer_id.clone(),
                    viewer_name: viewer_name.clone(),
                    count: *count,
                });
            top_by_event.insert(ty, best);
        }

        let top_overall = per_event
            .iter()
            .fold(None, |best, row| pick_leader(best, row))
            .map(|(ty, viewer_id, viewer_name, count)| {
                (
                    *ty,
                    ViewerCount {
                        viewer_id: viewer_id.clone(),
                        viewer_name: viewer_name.clone(),
                        count: *count,
                    },
                )
            });

        Ok(GameSummary {
            event_totals,
            viewer_totals,
            top_by_event,
            top_overall,
            ended_at,
        })
    }

    /// Zero-filled per-event-type recap for one viewer, usable whether or
    /// not the room has ended.
    pub async fn get_viewer_summary(&self, room: &RoomId, viewer: &ViewerId) -> Result<ViewerSummary, EngineError> {
        let counts = self.store.counts_for_viewer(room, viewer).await?;
        let total = counts.values().sum();
        let viewer_name = self.store.get_viewer(viewer).await?.and_then(|v| v.name);
        Ok(ViewerSummary {
            viewer_id: viewer.clone(),
            viewer_name,
            counts,
            total,
        })
    }
}
