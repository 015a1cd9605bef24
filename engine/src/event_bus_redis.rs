//! Redis pub/sub-backed [`EventBus`], so `GameEvent` fanout reaches every
//! server instance, not just the one that owns the presenter's local
//! `RoomId` counters. Publish is a plain `PUBLISH`; subscribe opens a
//! dedicated pub/sub connection, since a `ConnectionManager` cannot also
//! serve pub/sub traffic.

use crate::error::EngineError;
use crate::event_bus::EventBus;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio_util::sync::CancellationToken;

pub struct RedisEventBus {
    client: redis::Client,
    publish_conn: ConnectionManager,
}

impl RedisEventBus {
    pub async fn connect(redis_url: &str) -> Result<Self, EngineError> {
        let client = redis::Client::open(redis_url).map_err(redis_err)?;
        let publish_conn = ConnectionManager::new(client.clone()).await.map_err(redis_err)?;
        Ok(Self { client, publish_conn })
    }
}

fn redis_err(e: redis::RedisError) -> EngineError {
    EngineError::BusError(e.to_string())
}

#[async_trait]
impl EventBus for RedisEventBus {
    async fn publish(&self, channel: &str, payload: Bytes) -> Result<(), EngineError> {
        let mut conn = self.publish_conn.clone();
        conn.publish(channel, payload.to_vec()).await.map_err(redis_err)
    }

    async fn subscribe(
        &self,
        channel: &str,
        cancel: CancellationToken,
        handler: Box<dyn Fn(Bytes) + Send + Sync>,
    ) -> Result<(), EngineError> {
        let mut pubsub = self.client.get_async_pubsub().await.map_err(redis_err)?;
        pubsub.subscribe(channel).await.map_err(redis_err)?;
        let mut stream = pubsub.on_message();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                message = stream.next() => match message {
                    Some(msg) => {
                        let payload: Vec<u8> = msg.get_payload().map_err(redis_err)?;
                        handler(Bytes::from(payload));
                    }
                    None => return Ok(()),
                },
            }
        }
    }
}
