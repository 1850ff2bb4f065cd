//! Service bootstrap: configuration, tracing, wiring and the HTTP server.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use classcast::adapters::bus::RedisBus;
use classcast::adapters::http::{health_router, progress_router, HealthState, ProgressState};
use classcast::adapters::websocket::{
    realtime_router, BusBridge, EventRouter, NullBridge, RealtimeState, RoomBridge, RoomRegistry,
};
use classcast::config::{AppConfig, ServerConfig};
use classcast::domain::InstanceId;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;
    init_tracing(&config.server);

    let registry = Arc::new(RoomRegistry::new());
    let instance = InstanceId::new();

    // Bridge variant is chosen once here; a configured-but-unreachable bus
    // aborts startup instead of silently running single-instance.
    let (bridge, bus_bridge): (Arc<dyn RoomBridge>, Option<Arc<BusBridge>>) =
        match config.bus.url.as_deref() {
            Some(url) => {
                let transport = Arc::new(RedisBus::connect(url).await?);
                let bridge =
                    BusBridge::connect(transport, config.bus.channel.clone(), instance).await?;
                (Arc::clone(&bridge) as Arc<dyn RoomBridge>, Some(bridge))
            }
            None => {
                tracing::info!("No bus configured; running in single-instance mode");
                (Arc::new(NullBridge), None)
            }
        };

    let router = EventRouter::new(Arc::clone(&registry), bridge);
    if let Some(bus_bridge) = bus_bridge {
        bus_bridge.start(Arc::clone(&router))?;
    }

    let app = Router::new()
        .merge(realtime_router().with_state(RealtimeState::new(
            Arc::clone(&registry),
            Arc::clone(&router),
        )))
        .merge(health_router().with_state(HealthState::new(Arc::clone(&registry))))
        .nest(
            "/api",
            progress_router().with_state(ProgressState::new(Arc::clone(&router))),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.server));

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, %instance, "Classcast listening");

    axum::serve(listener, app).await?;
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(server.log_level.clone()));

    if server.is_production() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins_list()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
