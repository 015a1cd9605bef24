use axum::Router;
use server::config::AppConfig;
use server::state::AppState;
use server::{bus_subscriber, routes};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::services::{ServeDir, ServeFile};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true),
        )
        .init();

    let config = AppConfig::from_env()?;
    let state = Arc::new(build_state(config).await?);

    let shutdown = CancellationToken::new();
    let subscriber_state = state.clone();
    let subscriber_cancel = shutdown.clone();
    tokio::spawn(async move {
        bus_subscriber::run_supervised(subscriber_state, subscriber_cancel).await;
    });

    let app: Router = routes::router()
        .with_state(state.clone())
        .fallback_service(ServeDir::new(".").not_found_service(ServeFile::new("index.html")));

    let listener = tokio::net::TcpListener::bind(&state.config.bind_addr).await?;
    tracing::info!(addr = %state.config.bind_addr, "listening");
    axum::serve(listener, app).await?;

    shutdown.cancel();
    Ok(())
}

#[cfg(all(feature = "postgres", feature = "redis-backend"))]
async fn build_state(config: AppConfig) -> anyhow::Result<AppState> {
    use engine::counter_store_redis::RedisCounterStore;
    use engine::event_bus_redis::RedisEventBus;
    use engine::store_postgres::PostgresStore;
    use std::sync::Arc as StdArc;

    if let (Some(database_url), Some(redis_url)) = (&config.database_url, &config.redis_url) {
        let store = PostgresStore::connect(database_url).await?;
        store.migrate().await?;
        let counters = RedisCounterStore::connect(redis_url).await?;
        let bus = RedisEventBus::connect(redis_url).await?;
        return Ok(AppState::new(StdArc::new(store), StdArc::new(counters), StdArc::new(bus), config));
    }
    Ok(AppState::in_memory(config))
}

#[cfg(not(all(feature = "postgres", feature = "redis-backend")))]
async fn build_state(config: AppConfig) -> anyhow::Result<AppState> {
    Ok(AppState::in_memory(config))
}
