//! Typed errors for the engine. Libraries propagate typed errors; only the
//! composition root (`server::main`) reaches for `anyhow` context.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown event type {0:?}")]
    InvalidEventType(String),

    #[error("room {0} does not exist")]
    RoomNotFound(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("event bus error: {0}")]
    BusError(String),
}
