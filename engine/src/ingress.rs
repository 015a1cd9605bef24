//! The press ingestion pipeline: the single place where a viewer press
//! becomes a counted, thresholded, possibly-triggering event. Composes
//! [`DurableStore`], [`CounterStore`], and [`EventBus`] behind one call,
//! mirroring the teacher's `processing_module`'s role as the one seam where
//! an inbound message turns into state changes plus outbound fanout.

use crate::counter_store::{active_viewers_clamped, SharedCounterStore};
use crate::error::EngineError;
use crate::event_bus::EventBus;
use crate::store::DurableStore;
use protocol::{threshold_for, EventResult, EventType, GAME_EVENTS_CHANNEL};
use protocol::{PresenterOutbound, RoomId, ViewerId};
use std::sync::Arc;

pub struct IngressPipeline {
    store: Arc<dyn DurableStore>,
    counters: SharedCounterStore,
    bus: Arc<dyn EventBus>,
}

impl IngressPipeline {
    pub fn new(store: Arc<dyn DurableStore>, counters: SharedCounterStore, bus: Arc<dyn EventBus>) -> Self {
        Self { store, counters, bus }
    }

    /// Records one press batch (`push_count` identical presses of `ty` from
    /// `viewer`) and returns the resulting counter state. Per spec §4.2:
    ///
    /// 1. append an audit event row
    /// 2. stamp the viewer's activity for the active-viewer window
    /// 3. increment the counter by `push_count`
    /// 4. read the clamped active-viewer count
    /// 5. compute the required count from the current active-viewer count
    /// 6. decide whether the press just crossed the threshold
    /// 7. on a crossing: carry the overshoot forward, publish a
    ///    `GameEvent` onto the bus, and re-read active viewers fresh to
    ///    report the next threshold
    /// 8. report the next threshold a future press needs to clear
    pub async fn process_event(
        &self,
        room: &RoomId,
        viewer: &ViewerId,
        ty: EventType,
        push_count: i64,
    ) -> Result<EventResult, EngineError> {
        self.store
            .append_event(room, Some(viewer), ty, &format!(r#"{{"push_count":{push_count}}}"#))
            .await?;
        self.counters.update_viewer_activity(room, viewer).await.ok();

        let current_count = self.counters.increment(room, ty, push_count).await?;
        let viewer_count = active_viewers_clamped(self.counters.as_ref(), room).await;
        let required_count = threshold_for(ty, viewer_count);
        let effect_triggered = current_count >= required_count;

        let next_threshold = if effect_triggered {
            let excess = current_count - required_count;
            self.counters.set_excess(room, ty, excess).await?;
            let event = PresenterOutbound::GameEvent {
                room_id: room.clone(),
                event_type: ty,
                trigger_count: current_count,
                viewer_count,
            };
            let payload = serde_json::to_vec(&event).map_err(|e| EngineError::BusError(e.to_string()))?;
            self.bus.publish(GAME_EVENTS_CHANNEL, payload.into()).await?;
            // Spec §4.2 step 7: recompute from a fresh active-viewer reading,
            // not the one taken before the trigger fired.
            let fresh_viewer_count = active_viewers_clamped(self.counters.as_ref(), room).await;
            threshold_for(ty, fresh_viewer_count)
        } else {
            required_count
        };

        Ok(EventResult {
            event_type: ty,
            current_count: if effect_triggered {
                current_count - required_count
            } else {
                current_count
            },
            required_count,
            viewer_count,
            effect_triggered,
            next_threshold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter_store::InMemoryCounterStore;
    use crate::event_bus::InMemoryEventBus;
    use crate::store::InMemoryStore;

    fn pipeline() -> IngressPipeline {
        IngressPipeline::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryCounterStore::new()),
            Arc::new(InMemoryEventBus::new()),
        )
    }

    #[tokio::test]
    async fn single_press_below_threshold_does_not_trigger() {
        let pipeline = pipeline();
        let room = RoomId::from("R1");
        let viewer = ViewerId::from("V1");
        let result = pipeline
            .process_event(&room, &viewer, EventType::Helpful1, 1)
            .await
            .unwrap();
        assert!(!result.effect_triggered);
        assert_eq!(result.current_count, 1);
        assert_eq!(result.required_count, 5);
        assert_eq!(result.next_threshold, 5);
    }

    #[tokio::test]
    async fn crossing_the_threshold_triggers_and_carries_overshoot() {
        let pipeline = pipeline();
        let room = RoomId::from("R1");
        let viewer = ViewerId::from("V1");
        pipeline.process_event(&room, &viewer, EventType::Helpful1, 4).await.unwrap();
        let result = pipeline
            .process_event(&room, &viewer, EventType::Helpful1, 3)
            .await
            .unwrap();
        assert!(result.effect_triggered);
        // required_count 5, total presses 7, overshoot carried = 2
        assert_eq!(result.current_count, 2);
    }

    #[tokio::test]
    async fn threshold_scales_with_active_viewer_count() {
        let pipeline = pipeline();
        let room = RoomId::from("R1");
        for n in 0..20 {
            let viewer = ViewerId::from(format!("V{n}"));
            pipeline.process_event(&room, &viewer, EventType::Helpful1, 0).await.unwrap();
        }
        let viewer = ViewerId::from("V-last");
        let result = pipeline.process_event(&room, &viewer, EventType::Helpful1, 1).await.unwrap();
        // 21 active viewers -> multiplier 2.0 -> ceil(5*2.0) = 10
        assert_eq!(result.required_count, 10);
    }
}
