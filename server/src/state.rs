//! Shared application state, the `server` analogue of the teacher's
//! `lobby::AppState` — but composed from `engine`'s trait objects instead
//! of owning a raw `HashMap<String, Room>` directly.

use crate::config::AppConfig;
use engine::{
    CounterStore, DurableStore, EventBus, IngressPipeline, InMemoryCounterStore, InMemoryEventBus, InMemoryStore,
    PresenterRegistry, SessionService,
};
use protocol::RoomId;
use std::sync::Arc;

pub struct AppState {
    pub store: Arc<dyn DurableStore>,
    pub counters: Arc<dyn CounterStore>,
    pub bus: Arc<dyn EventBus>,
    pub ingress: IngressPipeline,
    pub session: SessionService,
    pub presenters: PresenterRegistry,
    pub config: AppConfig,
}

impl AppState {
    pub fn in_memory(config: AppConfig) -> Self {
        let store: Arc<dyn DurableStore> = Arc::new(InMemoryStore::new());
        let counters: Arc<dyn CounterStore> = Arc::new(InMemoryCounterStore::new());
        let bus: Arc<dyn EventBus> = Arc::new(InMemoryEventBus::new());
        Self::new(store, counters, bus, config)
    }

    pub fn new(
        store: Arc<dyn DurableStore>,
        counters: Arc<dyn CounterStore>,
        bus: Arc<dyn EventBus>,
        config: AppConfig,
    ) -> Self {
        let ingress = IngressPipeline::new(store.clone(), counters.clone(), bus.clone());
        let session = SessionService::new(store.clone(), counters.clone());
        Self {
            store,
            counters,
            bus,
            ingress,
            session,
            presenters: PresenterRegistry::new(),
            config,
        }
    }

    /// `web_url`/`qr_code` payload handed to a presenter on connect. No
    /// actual QR image is rendered here — the client renders the QR code
    /// from `web_url` itself, so this is just the viewer-facing join URL.
    pub fn viewer_join_url(&self, room: &RoomId) -> String {
        format!("{}/join/{}", self.config.public_base_url, room.as_str())
    }
}
