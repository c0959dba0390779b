//! topic-relay server entry point.
//!
//! Starts the hub, the optional upstream feed bridge, and the Axum HTTP
//! server with REST and WebSocket endpoints.

use std::net::SocketAddr;

use anyhow::Context;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use topic_relay::api;
use topic_relay::app_state::AppState;
use topic_relay::bridge::{RedisFeed, UpstreamBridge};
use topic_relay::config::RelayConfig;
use topic_relay::hub::Hub;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = RelayConfig::from_env().context("loading configuration")?;
    tracing::info!(
        addr = %config.listen_addr,
        pair = config.connection.supported_pair.as_str(),
        policy = ?config.topic_switch_policy,
        "starting topic-relay"
    );

    let (hub, hub_task) = Hub::spawn(config.topic_switch_policy, config.hub_queue_capacity);

    // Upstream feed
    match &config.feed {
        Some(settings) => {
            let feed = RedisFeed::new(settings).context("configuring upstream feed")?;
            let (messages, _feed_task) = feed.spawn();
            let bridge = UpstreamBridge::new(hub.clone(), settings.topic_mapping.clone());
            tokio::spawn(bridge.run(messages));
        }
        None => tracing::warn!("no upstream feed configured, only targeted notices will flow"),
    }

    let app = api::build_router(AppState::new(hub, config.connection))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("serving")?;

    hub_task.abort();
    tracing::info!("topic-relay stopped");
    Ok(())
}

/// Installs the global subscriber. `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
