//! Concurrency-safe `(room, event_type) -> count` mapping plus per-room
//! viewer activity tracking. Two implementations share this capability set:
//! [`InMemoryCounterStore`] for single-instance deployments and tests, and
//! `RedisCounterStore` (behind the `redis-backend` feature, in
//! `counter_store_redis`) for multi-instance deployments.

use crate::error::EngineError;
use async_trait::async_trait;
use dashmap::DashMap;
use protocol::{ACTIVE_VIEWER_WINDOW_SECS, EventType, RoomId, ViewerId};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Active-viewer counts are clamped into this range before being handed to
/// the threshold function, so a telemetry glitch never fails a press.
pub const ACTIVE_VIEWER_CLAMP: (i64, i64) = (1, 1_000_000);

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically adds `delta` and returns the post-increment value.
    async fn increment(&self, room: &RoomId, ty: EventType, delta: i64) -> Result<i64, EngineError>;

    /// `0` if absent.
    async fn get(&self, room: &RoomId, ty: EventType) -> Result<i64, EngineError>;

    /// Overwrites the counter with exactly `v` (used to carry the overshoot
    /// after a trigger fires).
    async fn set_excess(&self, room: &RoomId, ty: EventType, v: i64) -> Result<(), EngineError>;

    /// Deletes the counter entirely.
    async fn reset(&self, room: &RoomId, ty: EventType) -> Result<(), EngineError>;

    /// Stamps `viewer`'s last-seen time to now. Errors here are non-fatal at
    /// the caller (press ingestion continues regardless).
    async fn update_viewer_activity(&self, room: &RoomId, viewer: &ViewerId) -> Result<(), EngineError>;

    /// Count of viewers seen within the last [`protocol::ACTIVE_VIEWER_WINDOW_SECS`].
    async fn active_viewer_count(&self, room: &RoomId) -> Result<i64, EngineError>;
}

/// Reads the active viewer count, clamping to [`ACTIVE_VIEWER_CLAMP`] and
/// downgrading any backend error to `1` — the product cannot fail a viewer
/// press on a telemetry failure (spec §4.1).
pub async fn active_viewers_clamped(store: &dyn CounterStore, room: &RoomId) -> i64 {
    let raw = match store.active_viewer_count(room).await {
        Ok(v) => v,
        Err(err) => {
            tracing::warn!(?err, room = %room, "active viewer count failed, downgrading to 1");
            1
        }
    };
    raw.clamp(ACTIVE_VIEWER_CLAMP.0, ACTIVE_VIEWER_CLAMP.1)
}

#[derive(Default)]
pub struct InMemoryCounterStore {
    counters: DashMap<(RoomId, EventType), AtomicI64>,
    // room -> (viewer -> last_seen_unix_secs)
    viewers: DashMap<RoomId, DashMap<ViewerId, i64>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    fn prune(room_viewers: &DashMap<ViewerId, i64>, now: i64) {
        room_viewers.retain(|_, last_seen| now - *last_seen <= ACTIVE_VIEWER_WINDOW_SECS);
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn increment(&self, room: &RoomId, ty: EventType, delta: i64) -> Result<i64, EngineError> {
        let entry = self
            .counters
            .entry((room.clone(), ty))
            .or_insert_with(|| AtomicI64::new(0));
        Ok(entry.fetch_add(delta, Ordering::SeqCst) + delta)
    }

    async fn get(&self, room: &RoomId, ty: EventType) -> Result<i64, EngineError> {
        Ok(self
            .counters
            .get(&(room.clone(), ty))
            .map(|v| v.load(Ordering::SeqCst))
            .unwrap_or(0))
    }

    async fn set_excess(&self, room: &RoomId, ty: EventType, v: i64) -> Result<(), EngineError> {
        self.counters
            .entry((room.clone(), ty))
            .or_insert_with(|| AtomicI64::new(0))
            .store(v, Ordering::SeqCst);
        Ok(())
    }

    async fn reset(&self, room: &RoomId, ty: EventType) -> Result<(), EngineError> {
        self.counters.remove(&(room.clone(), ty));
        Ok(())
    }

    async fn update_viewer_activity(&self, room: &RoomId, viewer: &ViewerId) -> Result<(), EngineError> {
        let now = Self::now();
        let room_viewers = self.viewers.entry(room.clone()).or_default();
        room_viewers.insert(viewer.clone(), now);
        Self::prune(&room_viewers, now);
        Ok(())
    }

    async fn active_viewer_count(&self, room: &RoomId) -> Result<i64, EngineError> {
        let now = Self::now();
        match self.viewers.get(room) {
            Some(room_viewers) => {
                Self::prune(&room_viewers, now);
                Ok(room_viewers.len() as i64)
            }
            None => Ok(0),
        }
    }
}

pub type SharedCounterStore = Arc<dyn CounterStore>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn increment_is_monotone_except_for_set_excess_and_reset() {
        let store = InMemoryCounterStore::new();
        let room = RoomId::from("R1");
        assert_eq!(store.increment(&room, EventType::Helpful1, 3).await.unwrap(), 3);
        assert_eq!(store.increment(&room, EventType::Helpful1, 2).await.unwrap(), 5);
        assert_eq!(store.get(&room, EventType::Helpful1).await.unwrap(), 5);
        store.set_excess(&room, EventType::Helpful1, 1).await.unwrap();
        assert_eq!(store.get(&room, EventType::Helpful1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn get_is_zero_for_absent_counters() {
        let store = InMemoryCounterStore::new();
        let room = RoomId::from("R1");
        assert_eq!(store.get(&room, EventType::Helpful2).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reset_deletes_the_counter() {
        let store = InMemoryCounterStore::new();
        let room = RoomId::from("R1");
        store.increment(&room, EventType::Helpful1, 5).await.unwrap();
        store.reset(&room, EventType::Helpful1).await.unwrap();
        assert_eq!(store.get(&room, EventType::Helpful1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn active_viewer_count_tracks_distinct_viewers() {
        let store = InMemoryCounterStore::new();
        let room = RoomId::from("R1");
        store.update_viewer_activity(&room, &ViewerId::from("V1")).await.unwrap();
        store.update_viewer_activity(&room, &ViewerId::from("V2")).await.unwrap();
        store.update_viewer_activity(&room, &ViewerId::from("V1")).await.unwrap();
        assert_eq!(store.active_viewer_count(&room).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn stale_viewers_are_pruned_out_of_the_active_count() {
        let store = InMemoryCounterStore::new();
        let room = RoomId::from("R1");
        store.update_viewer_activity(&room, &ViewerId::from("fresh")).await.unwrap();
        // Backdate a second viewer past the 5-minute window directly, since
        // this is a white-box test of the opportunistic-pruning behavior.
        let stale_at = InMemoryCounterStore::now() - ACTIVE_VIEWER_WINDOW_SECS - 1;
        store
            .viewers
            .entry(room.clone())
            .or_default()
            .insert(ViewerId::from("stale"), stale_at);

        assert_eq!(store.active_viewer_count(&room).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn clamp_downgrades_errors_to_one() {
        struct FailingStore;
        #[async_trait]
        impl CounterStore for FailingStore {
            async fn increment(&self, _: &RoomId, _: EventType, _: i64) -> Result<i64, EngineError> {
                unimplemented!()
            }
            async fn get(&self, _: &RoomId, _: EventType) -> Result<i64, EngineError> {
                unimplemented!()
            }
            async fn set_excess(&self, _: &RoomId, _: EventType, _: i64) -> Result<(), EngineError> {
                unimplemented!()
            }
            async fn reset(&self, _: &RoomId, _: EventType) -> Result<(), EngineError> {
                unimplemented!()
            }
            async fn update_viewer_activity(&self, _: &RoomId, _: &ViewerId) -> Result<(), EngineError> {
                unimplemented!()
            }
            async fn active_viewer_count(&self, _: &RoomId) -> Result<i64, EngineError> {
                Err(EngineError::StorageError("boom".into()))
            }
        }
        let store = FailingStore;
        let room = RoomId::from("R1");
        assert_eq!(active_viewers_clamped(&store, &room).await, 1);
    }
}
