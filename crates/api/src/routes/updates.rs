//! Live order updates over server-sent events.
//!
//! The stream opens with a `snapshot` event carrying the current order, or
//! an `absent` event when the order does not exist yet. Every applied event
//! then produces one `update`. A client that falls behind gets a final
//! `lagged` event and the stream ends.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use common::OrderId;
use domain::Order;
use futures_util::{Stream, StreamExt, future, stream};

use crate::error::ApiError;
use crate::routes::orders::{AppState, OrderResponse};

/// GET /order-updates/{order_id}
#[tracing::instrument(skip(state))]
pub async fn order_updates(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let subscription = state.projection.subscribe(OrderId::new(order_id)).await?;

    let first = match subscription.initial() {
        Some(order) => order_event("snapshot", order),
        None => Event::default()
            .event("absent")
            .data(subscription.order_id().as_str()),
    };

    let updates = subscription.map(|update| {
        Ok(match update {
            Ok(order) => order_event("update", &order),
            Err(err) => {
                tracing::warn!(error = %err, "closing live order stream");
                Event::default().event("lagged").data(err.to_string())
            }
        })
    });

    let events = stream::once(future::ready(Ok(first))).chain(updates);
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn order_event(name: &'static str, order: &Order) -> Event {
    Event::default()
        .event(name)
        .json_data(OrderResponse::new(order))
        .unwrap_or_else(|err| Event::default().event("error").data(err.to_string()))
}
