//! Progress trigger endpoint.
//!
//! Boundary integration point: turns a plain HTTP request into a
//! server-synthesized room event and hands it to the event router's normal
//! dispatch path. No room-membership logic lives here.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::adapters::websocket::{EventRouter, ServerMessage};
use crate::domain::{RoomEvent, RoomId, Timestamp};

/// Default user label when the request names none.
const DEFAULT_USER: &str = "user-demo";

/// Default completion percentage when the request names none.
const DEFAULT_PERCENT: f64 = 100.0;

#[derive(Clone)]
pub struct ProgressState {
    pub router: Arc<EventRouter>,
}

impl ProgressState {
    pub fn new(router: Arc<EventRouter>) -> Self {
        Self { router }
    }
}

/// Request body for the mark-complete trigger. Both fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRequest {
    pub user_id: Option<String>,
    pub percent: Option<f64>,
}

/// Echoes the clamped/defaulted values that were actually broadcast.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    pub ok: bool,
    pub track_id: String,
    pub lesson_id: String,
    pub user_id: String,
    pub percent: u8,
}

/// Mark a lesson complete and broadcast the progress to the track room.
///
/// POST /api/tracks/:track_id/lessons/:lesson_id/complete
pub async fn complete_lesson(
    State(state): State<ProgressState>,
    Path((track_id, lesson_id)): Path<(String, String)>,
    body: Option<Json<ProgressRequest>>,
) -> Json<ProgressResponse> {
    let request = body.map(|Json(r)| r).unwrap_or_default();

    let user_id = request
        .user_id
        .unwrap_or_else(|| DEFAULT_USER.to_string());
    let percent = request
        .percent
        .unwrap_or(DEFAULT_PERCENT)
        .clamp(0.0, 100.0)
        .round() as u8;

    let room = RoomId::new(format!("track:{track_id}"));
    let payload = ServerMessage::Progress {
        track_id: track_id.clone(),
        lesson_id: lesson_id.clone(),
        user_id: user_id.clone(),
        percent,
        ts: Timestamp::now().as_unix_millis(),
    };

    tracing::info!(%room, lesson = %lesson_id, user = %user_id, percent, "Broadcasting lesson progress");
    state
        .router
        .dispatch(RoomEvent::from_server("progress:update", room, payload.into_value()));

    Json(ProgressResponse {
        ok: true,
        track_id,
        lesson_id,
        user_id,
        percent,
    })
}

/// Router for the progress trigger, for mounting at `/api`.
pub fn progress_router() -> Router<ProgressState> {
    Router::new().route(
        "/tracks/:track_id/lessons/:lesson_id/complete",
        post(complete_lesson),
    )
}
