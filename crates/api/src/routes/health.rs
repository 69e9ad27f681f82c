//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::routes::orders::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub events_applied: u64,
    pub events_rejected: u64,
    pub active_subscriptions: usize,
}

/// GET /health: liveness plus projection progress.
pub async fn check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let position = state.projection.position();
    Json(HealthResponse {
        status: "ok",
        events_applied: position.events_applied,
        events_rejected: position.events_rejected,
        active_subscriptions: state.projection.registry().active_subscriptions(),
    })
}
