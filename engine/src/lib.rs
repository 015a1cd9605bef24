//! Core game engine: press ingestion, threshold evaluation, durable
//! storage, cross-instance fanout, and the presenter connection registry.
//! `server` is the only crate that turns this into a network service; this
//! crate has no knowledge of HTTP, WebSockets, or configuration.

pub mod counter_store;
pub mod error;
pub mod event_bus;
pub mod ids;
pub mod ingress;
pub mod presenter_registry;
pub mod session;
pub mod store;

#[cfg(feature = "postgres")]
pub mod store_postgres;

#[cfg(feature = "redis-backend")]
pub mod counter_store_redis;

#[cfg(feature = "redis-backend")]
pub mod event_bus_redis;

pub use counter_store::{CounterStore, InMemoryCounterStore, SharedCounterStore};
pub use error::EngineError;
pub use event_bus::{EventBus, InMemoryEventBus};
pub use ids::generate_id;
pub use ingress::IngressPipeline;
pub use presenter_registry::{PresenterRegistry, PresenterSink, SinkHandle};
pub use session::SessionService;
pub use store::{DurableStore, Event, InMemoryStore, Room, RoomStatus, ViewerRecord};
