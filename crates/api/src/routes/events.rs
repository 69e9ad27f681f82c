//! Raw event ingestion endpoint for an external event feed.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use domain::{DomainEvent, OrderEvent};

use crate::error::ApiError;
use crate::routes::orders::{AppState, OrderResponse};

/// POST /events: apply one event and return the resulting order.
#[tracing::instrument(skip(state, event), fields(event_type = event.event_type()))]
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    Json(event): Json<OrderEvent>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.projection.ingest(event).await?;
    Ok(Json(OrderResponse::new(&order)))
}
