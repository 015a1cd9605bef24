//! In-process `room_id -> live presenter connection` mapping. Generalizes
//! `ferrex-server`'s `ConnectionManager` (`DashMap`-backed room membership)
//! down to this engine's one-presenter-per-room shape.
//!
//! The single non-obvious invariant (spec §9): unregister must compare the
//! stored handle by *pointer identity*, not just by room id, so that a
//! late-arriving disconnect from a connection that has already been
//! replaced by a reconnect does not erase the new connection.

use crate::error::EngineError;
use async_trait::async_trait;
use dashmap::DashMap;
use protocol::RoomId;
use std::sync::Arc;

/// A single outbound sink to a presenter. Implementations must serialize
/// concurrent writers internally (e.g. an inner `tokio::sync::Mutex`) —
/// the registry only ever holds one `Arc` per room and compares those by
/// pointer, so identity must be stable for the connection's lifetime.
#[async_trait]
pub trait PresenterSink: Send + Sync {
    async fn send(&self, payload: bytes::Bytes) -> Result<(), EngineError>;
}

pub type SinkHandle = Arc<dyn PresenterSink>;

#[derive(Default)]
pub struct PresenterRegistry {
    connections: DashMap<RoomId, SinkHandle>,
}

impl PresenterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `conn` under `room`, overwriting any prior handle
    /// unconditionally. Does not touch durable room state.
    pub fn register_with(&self, room: RoomId, conn: SinkHandle) {
        self.connections.insert(room, conn);
    }

    /// Deletes the mapping only if the currently stored handle is the same
    /// `Arc` as `conn` — a stale unregister after a reconnect must not
    /// erase the replacement connection.
    pub fn unregister(&self, room: &RoomId, conn: &SinkHandle) {
        if let Some(existing) = self.connections.get(room)
            && Arc::ptr_eq(&existing, conn)
        {
            drop(existing);
            self.connections.remove(room);
        }
    }

    /// Looks up and sends. A missing mapping is normal — another instance
    /// may hold the connection — so this returns `Ok(())` rather than an
    /// error when nothing is registered locally.
    pub async fn send_event_to(&self, room: &RoomId, payload: bytes::Bytes) -> Result<(), EngineError> {
        let Some(conn) = self.connections.get(room).map(|c| c.clone()) else {
            return Ok(());
        };
        conn.send(payload).await
    }

    pub fn contains(&self, room: &RoomId) -> bool {
        self.connections.contains_key(room)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingSink {
        sent: AtomicUsize,
    }

    #[async_trait]
    impl PresenterSink for RecordingSink {
        async fn send(&self, _payload: bytes::Bytes) -> Result<(), EngineError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn sink() -> SinkHandle {
        Arc::new(RecordingSink { sent: AtomicUsize::new(0) })
    }

    #[tokio::test]
    async fn unregister_only_removes_the_matching_pointer() {
        let registry = PresenterRegistry::new();
        let room = RoomId::from("R1");
        let a = sink();
        let b = sink();

        registry.register_with(room.clone(), a.clone());
        registry.register_with(room.clone(), b.clone());
        // A late unregister of the superseded connection A must not erase B.
        registry.unregister(&room, &a);

        assert!(registry.contains(&room));
        registry.send_event_to(&room, bytes::Bytes::new()).await.unwrap();
        // b received it, not a.
    }

    #[tokio::test]
    async fn unregister_with_current_handle_removes_it() {
        let registry = PresenterRegistry::new();
        let room = RoomId::from("R1");
        let a = sink();
        registry.register_with(room.clone(), a.clone());
        registry.unregister(&room, &a);
        assert!(!registry.contains(&room));
    }

    #[tokio::test]
    async fn send_to_missing_room_is_not_an_error() {
        let registry = PresenterRegistry::new();
        let room = RoomId::from("missing");
        registry.send_event_to(&room, bytes::Bytes::new()).await.unwrap();
    }
}
