//! Publish/subscribe abstraction over a single named channel. The contract
//! (spec §4.4): publish failures are surfaced to the caller; subscription
//! handler errors are logged and the subscription continues; delivery is
//! best-effort. [`InMemoryEventBus`] mirrors the teacher's room-fanout
//! `broadcast::channel` pattern, keyed by channel name instead of room id.

use crate::error::EngineError;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Bounded per-subscriber queue depth for the in-memory broadcast channel.
/// A subscriber that falls behind by more than this many messages misses
/// the oldest ones — acceptable per the bus's best-effort contract.
const BROADCAST_CAPACITY: usize = 1024;

#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, channel: &str, payload: Bytes) -> Result<(), EngineError>;

    /// Blocks until `cancel` fires. `handler` is invoked for each message;
    /// handler panics are not caught here — implementations call it inside
    /// a context that logs and continues past `Err` returns, per spec §4.4.
    async fn subscribe(
        &self,
        channel: &str,
        cancel: CancellationToken,
        handler: Box<dyn Fn(Bytes) + Send + Sync>,
    ) -> Result<(), EngineError>;
}

#[derive(Default)]
pub struct InMemoryEventBus {
    channels: DashMap<String, broadcast::Sender<Bytes>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender_for(&self, channel: &str) -> broadcast::Sender<Bytes> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(BROADCAST_CAPACITY).0)
            .clone()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, channel: &str, payload: Bytes) -> Result<(), EngineError> {
        // An error here just means there are no current subscribers, which
        // is normal and not surfaced as a failure (nothing to deliver to).
        let _ = self.sender_for(channel).send(payload);
        Ok(())
    }

    async fn subscribe(
        &self,
        channel: &str,
        cancel: CancellationToken,
        handler: Box<dyn Fn(Bytes) + Send + Sync>,
    ) -> Result<(), EngineError> {
        let mut receiver = self.sender_for(channel).subscribe();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                message = receiver.recv() => match message {
                    Ok(payload) => handler(payload),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(channel, skipped, "event bus subscriber lagged, messages dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => return Ok(()),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn delivers_published_messages_to_subscribers() {
        let bus = Arc::new(InMemoryEventBus::new());
        let received = Arc::new(AtomicUsize::new(0));
        let received_clone = received.clone();
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();
        let bus_clone = bus.clone();
        let task = tokio::spawn(async move {
            bus_clone
                .subscribe(
                    "game_events",
                    cancel_clone,
                    Box::new(move |_payload| {
                        received_clone.fetch_add(1, Ordering::SeqCst);
                    }),
                )
                .await
                .unwrap();
        });

        // Give the subscriber a moment to register.
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        bus.publish("game_events", Bytes::from_static(b"{}")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        cancel.cancel();
        task.await.unwrap();

        assert_eq!(received.load(Ordering::SeqCst), 1);
    }
}
