use axum_test::TestServer;
use engine::{CounterStore, DurableStore, EventBus, InMemoryCounterStore, InMemoryEventBus, InMemoryStore};
use serde_json::json;
use server::config::AppConfig;
use server::routes;
use server::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn test_config() -> AppConfig {
    AppConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        database_url: None,
        redis_url: None,
        public_base_url: "http://localhost:8080".to_string(),
    }
}

fn test_server(state: Arc<AppState>) -> TestServer {
    let app = routes::router().with_state(state);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    TestServer::builder()
        .http_transport()
        .build(make_service)
        .expect("test server builds")
}

#[tokio::test]
async fn reconnect_with_room_id_resumes_the_same_room_without_recreating_it() {
    let state = Arc::new(AppState::in_memory(test_config()));
    let server = test_server(state.clone());

    let mut first = server.get_websocket("/ws-unity").await.into_websocket().await;
    let greeting: serde_json::Value = first.receive_json().await;
    assert_eq!(greeting["type"], "room_created");
    let room_id = greeting["room_id"].as_str().unwrap().to_string();
    first.close().await;

    let mut second = server
        .get_websocket(&format!("/ws-unity?room_id={room_id}"))
        .await
        .into_websocket()
        .await;
    let resumed: serde_json::Value = second.receive_json().await;
    assert_eq!(resumed["type"], "room_ready");
    assert_eq!(resumed["room_id"], room_id);

    // No duplicate room row was created for the resumed connection.
    let room = state
        .store
        .get_room(&protocol::RoomId::from(room_id))
        .await
        .unwrap();
    assert!(room.is_some());
}

#[tokio::test]
async fn presenter_receives_the_game_event_for_its_own_room() {
    // Two independently-constructed `AppState`s sharing the same durable
    // store, counter store, and event bus, but each with its own
    // `PresenterRegistry` — the multi-instance deployment this system
    // targets. The presenter's socket lives on instance A; the press lands
    // on instance B, exactly as it would behind a load balancer. Instance
    // A runs the real `bus_subscriber::run_supervised` task so delivery is
    // exercised end-to-end rather than hand-simulated.
    let store: Arc<dyn DurableStore> = Arc::new(InMemoryStore::new());
    let counters: Arc<dyn CounterStore> = Arc::new(InMemoryCounterStore::new());
    let bus: Arc<dyn EventBus> = Arc::new(InMemoryEventBus::new());

    let state_a = Arc::new(AppState::new(store.clone(), counters.clone(), bus.clone(), test_config()));
    let state_b = Arc::new(AppState::new(store.clone(), counters.clone(), bus.clone(), test_config()));

    let room_id = protocol::RoomId::from("R1");
    state_a.store.create_room_if_absent(&room_id, "presenter").await.unwrap();

    let cancel = CancellationToken::new();
    let subscriber = tokio::spawn(server::bus_subscriber::run_supervised(state_a.clone(), cancel.clone()));

    let server = test_server(state_a.clone());
    let mut presenter = server
        .get_websocket("/ws-unity?room_id=R1")
        .await
        .into_websocket()
        .await;
    let _greeting: serde_json::Value = presenter.receive_json().await;

    // Give the subscription a moment to register before the publish races it.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let viewer_id = protocol::ViewerId::from("V1");
    state_b
        .ingress
        .process_event(&room_id, &viewer_id, protocol::EventType::Helpful1, 7)
        .await
        .unwrap();

    let event: serde_json::Value = presenter.receive_json().await;
    assert_eq!(event["type"], "game_event");
    assert_eq!(event["room_id"], "R1");
    assert_eq!(event["trigger_count"], 7);

    cancel.cancel();
    subscriber.await.unwrap();
}

#[tokio::test]
async fn game_end_message_ends_the_room_and_sends_one_summary() {
    let state = Arc::new(AppState::in_memory(test_config()));
    let room_id = protocol::RoomId::from("R1");
    state.store.create_room_if_absent(&room_id, "presenter").await.unwrap();
    let server = test_server(state.clone());

    let mut presenter = server
        .get_websocket("/ws-unity?room_id=R1")
        .await
        .into_websocket()
        .await;
    let _greeting: serde_json::Value = presenter.receive_json().await;

    presenter.send_json(&json!({ "type": "game_end" })).await;
    let summary: serde_json::Value = presenter.receive_json().await;
    assert_eq!(summary["type"], "game_end_summary");
    assert_eq!(summary["room_id"], "R1");

    // Calling end_game again directly must not move ended_at.
    let first = state.session.end_game(&room_id).await.unwrap();
    let second = state.session.end_game(&room_id).await.unwrap();
    assert_eq!(first.ended_at, second.ended_at);
}
