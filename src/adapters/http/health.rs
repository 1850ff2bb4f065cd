//! Liveness endpoint with a couple of registry gauges.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::adapters::websocket::RoomRegistry;

#[derive(Clone)]
pub struct HealthState {
    pub registry: Arc<RoomRegistry>,
}

impl HealthState {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self { registry }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub connections: usize,
    pub rooms: usize,
}

/// GET /health
pub async fn health(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        connections: state.registry.connection_count(),
        rooms: state.registry.room_count(),
    })
}

pub fn health_router() -> Router<HealthState> {
    Router::new().route("/health", get(health))
}
