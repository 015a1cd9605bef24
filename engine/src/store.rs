//! Durable event log, room store, and viewer directory. [`DurableStore`]
//! exposes exactly the query shapes spec'd for the core: event append, the
//! five aggregation queries, room lifecycle, and viewer upsert. Two
//! implementations: [`InMemoryStore`] (tests, the in-memory deployment
//! profile) and `PostgresStore` (behind the `postgres` feature, in
//! `store_postgres`), grounded in `Lowband21-ferrex`'s
//! `core/src/database/postgres.rs` connection-pool-and-prepared-statement
//! pattern.

use crate::error::EngineError;
use crate::ids::generate_id;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use protocol::{EventType, RoomId, ViewerId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    Active,
    Ended,
}

#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    pub presenter_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub status: RoomStatus,
    pub settings: String,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct Event {
    pub id: i64,
    pub room_id: RoomId,
    pub viewer_id: Option<ViewerId>,
    pub event_type: EventType,
    pub triggered_at: DateTime<Utc>,
    pub metadata: String,
}

#[derive(Debug, Clone)]
pub struct ViewerRecord {
    pub id: ViewerId,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Trims and clamps a display name to [`protocol::VIEWER_NAME_MAX_CHARS`]
/// Unicode scalar values, per spec §4.7. Empty-after-trim becomes `None`.
pub fn normalize_viewer_name(name: &str) -> Option<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(protocol::VIEWER_NAME_MAX_CHARS).collect())
}

#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn append_event(
        &self,
        room: &RoomId,
        viewer: Option<&ViewerId>,
        ty: EventType,
        metadata: &str,
    ) -> Result<Event, EngineError>;

    /// `(event_type, viewer_id, viewer_name, count)` rows, excluding null
    /// viewers.
    async fn counts_by_event_and_viewer(
        &self,
        room: &RoomId,
    ) -> Result<Vec<(EventType, ViewerId, Option<String>, i64)>, EngineError>;

    async fn totals_by_event(&self, room: &RoomId) -> Result<HashMap<EventType, i64>, EngineError>;

    /// Sorted by count desc, then viewer_id asc (stable), excluding null
    /// viewers.
    async fn totals_by_viewer(
        &self,
        room: &RoomId,
    ) -> Result<Vec<(ViewerId, Option<String>, i64)>, EngineError>;

    async fn counts_for_viewer(
        &self,
        room: &RoomId,
        viewer: &ViewerId,
    ) -> Result<HashMap<EventType, i64>, EngineError>;

    async fn get_room(&self, room: &RoomId) -> Result<Option<Room>, EngineError>;

    /// Idempotently materializes a room: if `room` already exists, returns
    /// it unchanged; otherwise creates it with `presenter_id`.
    async fn create_room_if_absent(&self, room: &RoomId, presenter_id: &str) -> Result<Room, EngineError>;

    async fn mark_room_ended(&self, room: &RoomId, ended_at: DateTime<Utc>) -> Result<(), EngineError>;

    /// If `maybe_id` names an existing viewer, returns it unchanged;
    /// otherwise mints and persists a fresh one.
    async fn ensure_viewer_id(&self, maybe_id: Option<&str>) -> Result<ViewerId, EngineError>;

    async fn set_viewer_name(&self, id: &ViewerId, name: &str) -> Result<(), EngineError>;

    async fn get_viewer(&self, id: &ViewerId) -> Result<Option<ViewerRecord>, EngineError>;
}

pub struct InMemoryStore {
    rooms: DashMap<RoomId, Room>,
    events: DashMap<RoomId, Mutex<Vec<Event>>>,
    viewers: DashMap<ViewerId, ViewerRecord>,
    next_event_id: AtomicI64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            events: DashMap::new(),
            viewers: DashMap::new(),
            next_event_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl DurableStore for InMemoryStore {
    async fn append_event(
        &self,
        room: &RoomId,
        viewer: Option<&ViewerId>,
        ty: EventType,
        metadata: &str,
    ) -> Result<Event, EngineError> {
        let event = Event {
            id: self.next_event_id.fetch_add(1, Ordering::SeqCst),
            room_id: room.clone(),
            viewer_id: viewer.cloned(),
            event_type: ty,
            triggered_at: Utc::now(),
            metadata: metadata.to_string(),
        };
        self.events
            .entry(room.clone())
            .or_insert_with(|| Mutex::new(Vec::new()))
            .lock()
            .unwrap()
            .push(event.clone());
        Ok(event)
    }

    async fn counts_by_event_and_viewer(
        &self,
        room: &RoomId,
    ) -> Result<Vec<(EventType, ViewerId, Option<String>, i64)>, EngineError> {
        let mut tally: HashMap<(EventType, ViewerId), i64> = HashMap::new();
        if let Some(events) = self.events.get(room) {
            for event in events.lock().unwrap().iter() {
                if let Some(viewer) = &event.viewer_id {
                    *tally.entry((event.event_type, viewer.clone())).or_insert(0) += 1;
                }
            }
        }
        let mut rows = Vec::with_capacity(tally.len());
        for ((ty, viewer), count) in tally {
            let name = self.viewers.get(&viewer).and_then(|v| v.name.clone());
            rows.push((ty, viewer, name, count));
        }
        Ok(rows)
    }

    async fn totals_by_event(&self, room: &RoomId) -> Result<HashMap<EventType, i64>, EngineError> {
        let mut totals: HashMap<EventType, i64> = EventType::ALL.iter().map(|ty| (*ty, 0)).collect();
        if let Some(events) = self.events.get(room) {
            for event in events.lock().unwrap().iter() {
                *totals.entry(event.event_type).or_insert(0) += 1;
            }
        }
        Ok(totals)
    }

    async fn totals_by_viewer(
        &self,
        room: &RoomId,
    ) -> Result<Vec<(ViewerId, Option<String>, i64)>, EngineError> {
        let mut tally: HashMap<ViewerId, i64> = HashMap::new();
        if let Some(events) = self.events.get(room) {
            for event in events.lock().unwrap().iter() {
                if let Some(viewer) = &event.viewer_id {
                    *tally.entry(viewer.clone()).or_insert(0) += 1;
                }
            }
        }
        let mut rows: Vec<(ViewerId, Option<String>, i64)> = tally
            .into_iter()
            .map(|(viewer, count)| {
                let name = self.viewers.get(&viewer).and_then(|v| v.name.clone());
                (viewer, name, count)
            })
            .collect();
        rows.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.cmp(&b.0)));
        Ok(rows)
    }

    async fn counts_for_viewer(
        &self,
        room: &RoomId,
        viewer: &ViewerId,
    ) -> Result<HashMap<EventType, i64>, EngineError> {
        let mut totals: HashMap<EventType, i64> = EventType::ALL.iter().map(|ty| (*ty, 0)).collect();
        if let Some(events) = self.events.get(room) {
            for event in events.lock().unwrap().iter() {
                if event.viewer_id.as_ref() == Some(viewer) {
                    *totals.entry(event.event_type).or_insert(0) += 1;
                }
            }
        }
        Ok(totals)
    }

    async fn get_room(&self, room: &RoomId) -> Result<Option<Room>, EngineError> {
        Ok(self.rooms.get(room).map(|r| r.clone()))
    }

    async fn create_room_if_absent(&self, room: &RoomId, presenter_id: &str) -> Result<Room, EngineError> {
        if let Some(existing) = self.rooms.get(room) {
            return Ok(existing.clone());
        }
        let new_room = Room {
            id: room.clone(),
            presenter_id: presenter_id.to_string(),
            created_at: Utc::now(),
            expires_at: None,
            status: RoomStatus::Active,
            settings: String::new(),
            ended_at: None,
        };
        self.rooms
            .entry(room.clone())
            .or_insert_with(|| new_room.clone());
        Ok(self.rooms.get(room).unwrap().clone())
    }

    async fn mark_room_ended(&self, room: &RoomId, ended_at: DateTime<Utc>) -> Result<(), EngineError> {
        let mut entry = self
            .rooms
            .get_mut(room)
            .ok_or_else(|| EngineError::RoomNotFound(room.to_string()))?;
        if entry.status == RoomStatus::Active {
            entry.status = RoomStatus::Ended;
            entry.ended_at = Some(ended_at);
        }
        Ok(())
    }

    async fn ensure_viewer_id(&self, maybe_id: Option<&str>) -> Result<ViewerId, EngineError> {
        if let Some(id) = maybe_id
            && !id.is_empty()
        {
            let viewer_id = ViewerId::from(id);
            if self.viewers.contains_key(&viewer_id) {
                return Ok(viewer_id);
            }
        }
        let fresh = ViewerId::from(generate_id());
        let now = Utc::now();
        self.viewers.insert(
            fresh.clone(),
            ViewerRecord {
                id: fresh.clone(),
                name: None,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(fresh)
    }

    async fn set_viewer_name(&self, id: &ViewerId, name: &str) -> Result<(), EngineError> {
        let normalized = normalize_viewer_name(name);
        let now = Utc::now();
        self.viewers
            .entry(id.clone())
            .and_modify(|v| {
                v.name = normalized.clone();
                v.updated_at = now;
            })
            .or_insert_with(|| ViewerRecord {
                id: id.clone(),
                name: normalized,
                created_at: now,
                updated_at: now,
            });
        Ok(())
    }

    async fn get_viewer(&self, id: &ViewerId) -> Result<Option<ViewerRecord>, EngineError> {
        Ok(self.viewers.get(id).map(|v| v.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn room_lifecycle_transitions_once() {
        let store = InMemoryStore::new();
        let room = RoomId::from("R1");
        store.create_room_if_absent(&room, "presenter-a").await.unwrap();
        let first_end = Utc::now();
        store.mark_room_ended(&room, first_end).await.unwrap();
        // A second end attempt must not move ended_at.
        store.mark_room_ended(&room, Utc::now()).await.unwrap();
        let fetched = store.get_room(&room).await.unwrap().unwrap();
        assert_eq!(fetched.status, RoomStatus::Ended);
        assert_eq!(fetched.ended_at.unwrap(), first_end);
    }

    #[tokio::test]
    async fn create_room_if_absent_is_idempotent() {
        let store = InMemoryStore::new();
        let room = RoomId::from("R1");
        let first = store.create_room_if_absent(&room, "presenter-a").await.unwrap();
        let second = store.create_room_if_absent(&room, "presenter-b").await.unwrap();
        assert_eq!(first.presenter_id, second.presenter_id);
    }

    #[tokio::test]
    async fn totals_by_event_zero_fills_every_type() {
        let store = InMemoryStore::new();
        let room = RoomId::from("R1");
        store
            .append_event(&room, None, EventType::Helpful1, "{}")
            .await
            .unwrap();
        let totals = store.totals_by_event(&room).await.unwrap();
        assert_eq!(totals.len(), EventType::ALL.len());
        assert_eq!(totals[&EventType::Helpful1], 1);
        assert_eq!(totals[&EventType::Helpful2], 0);
    }

    #[tokio::test]
    async fn aggregations_ignore_null_viewers() {
        let store = InMemoryStore::new();
        let room = RoomId::from("R1");
        store
            .append_event(&room, None, EventType::Helpful1, "{}")
            .await
            .unwrap();
        let viewer = ViewerId::from("V1");
        store
            .append_event(&room, Some(&viewer), EventType::Helpful1, "{}")
            .await
            .unwrap();
        let totals = store.totals_by_viewer(&room).await.unwrap();
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].0, viewer);
    }

    #[tokio::test]
    async fn viewer_totals_sorted_by_count_desc_then_id_asc() {
        let store = InMemoryStore::new();
        let room = RoomId::from("R1");
        let v_a = ViewerId::from("A");
        let v_b = ViewerId::from("B");
        for _ in 0..2 {
            store.append_event(&room, Some(&v_a), EventType::Helpful1, "{}").await.unwrap();
        }
        store.append_event(&room, Some(&v_b), EventType::Helpful1, "{}").await.unwrap();
        let totals = store.totals_by_viewer(&room).await.unwrap();
        assert_eq!(totals[0].0, v_a);
        assert_eq!(totals[1].0, v_b);
    }

    #[tokio::test]
    async fn set_viewer_name_trims_and_clamps() {
        let store = InMemoryStore::new();
        let viewer = ViewerId::from("V1");
        store.set_viewer_name(&viewer, "   ").await.unwrap();
        assert_eq!(store.get_viewer(&viewer).await.unwrap().unwrap().name, None);

        let long_name = "x".repeat(40);
        store.set_viewer_name(&viewer, &long_name).await.unwrap();
        let record = store.get_viewer(&viewer).await.unwrap().unwrap();
        assert_eq!(record.name.unwrap().chars().count(), protocol::VIEWER_NAME_MAX_CHARS);
    }

    #[tokio::test]
    async fn ensure_viewer_id_reuses_existing_ids() {
        let store = InMemoryStore::new();
        let minted = store.ensure_viewer_id(None).await.unwrap();
        let reused = store.ensure_viewer_id(Some(minted.as_str())).await.unwrap();
        assert_eq!(minted, reused);
    }
}
