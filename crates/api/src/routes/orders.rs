//! Order command and query endpoints.
//!
//! Commands are translated one-to-one into events and ingested; the
//! response is the state of the order right after the event was applied.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{OrderId, ProductId};
use domain::{Order, OrderCommand, OrderStatus};
use projections::OrderProjection;
use serde::Serialize;

use crate::error::ApiError;

/// Product ordered by the demo shipping endpoints.
const DEMO_PRODUCT: &str = "Deluxe Chair";

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub projection: OrderProjection,
}

// -- Response types --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatusResponse {
    Created,
    Confirmed,
    Shipped,
}

impl From<OrderStatus> for OrderStatusResponse {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Created => OrderStatusResponse::Created,
            OrderStatus::Confirmed => OrderStatusResponse::Confirmed,
            OrderStatus::Shipped => OrderStatusResponse::Shipped,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_id: String,
    pub products: BTreeMap<String, u32>,
    pub order_status: OrderStatusResponse,
}

impl OrderResponse {
    pub fn new(order: &Order) -> Self {
        Self {
            order_id: order.order_id().to_string(),
            products: order
                .products()
                .iter()
                .map(|(product, qty)| (product.to_string(), *qty))
                .collect(),
            order_status: order.status().into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreatedResponse {
    pub order_id: String,
}

// -- Handlers --

/// POST /ship-order: create, fill, confirm and ship a fresh order.
#[tracing::instrument(skip(state))]
pub async fn ship_order(
    State(state): State<Arc<AppState>>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = OrderId::generate();
    let product_id = ProductId::new(DEMO_PRODUCT);

    execute(&state, OrderCommand::CreateOrder { order_id: order_id.clone() }).await?;
    execute(
        &state,
        OrderCommand::AddProduct {
            order_id: order_id.clone(),
            product_id,
        },
    )
    .await?;
    execute(&state, OrderCommand::ConfirmOrder { order_id: order_id.clone() }).await?;
    let order = execute(&state, OrderCommand::ShipOrder { order_id }).await?;

    Ok(Json(OrderResponse::new(&order)))
}

/// POST /ship-unconfirmed-order: like `/ship-order` but skips confirmation,
/// so the final step is rejected.
#[tracing::instrument(skip(state))]
pub async fn ship_unconfirmed_order(
    State(state): State<Arc<AppState>>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = OrderId::generate();

    execute(&state, OrderCommand::CreateOrder { order_id: order_id.clone() }).await?;
    execute(
        &state,
        OrderCommand::AddProduct {
            order_id: order_id.clone(),
            product_id: ProductId::new(DEMO_PRODUCT),
        },
    )
    .await?;
    let order = execute(&state, OrderCommand::ShipOrder { order_id }).await?;

    Ok(Json(OrderResponse::new(&order)))
}

/// POST /order: create an order with a generated ID.
#[tracing::instrument(skip(state))]
pub async fn create(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<OrderCreatedResponse>), ApiError> {
    create_order(&state, OrderId::generate()).await
}

/// POST /order/{order_id}: create an order with the given ID.
#[tracing::instrument(skip(state))]
pub async fn create_with_id(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<(StatusCode, Json<OrderCreatedResponse>), ApiError> {
    create_order(&state, OrderId::new(order_id)).await
}

/// POST /order/{order_id}/product/{product_id}
#[tracing::instrument(skip(state))]
pub async fn add_product(
    State(state): State<Arc<AppState>>,
    Path((order_id, product_id)): Path<(String, String)>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = execute(
        &state,
        OrderCommand::AddProduct {
            order_id: order_id.into(),
            product_id: product_id.into(),
        },
    )
    .await?;
    Ok(Json(OrderResponse::new(&order)))
}

/// POST /order/{order_id}/product/{product_id}/increment
#[tracing::instrument(skip(state))]
pub async fn increment_product(
    State(state): State<Arc<AppState>>,
    Path((order_id, product_id)): Path<(String, String)>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = execute(
        &state,
        OrderCommand::IncrementProductCount {
            order_id: order_id.into(),
            product_id: product_id.into(),
        },
    )
    .await?;
    Ok(Json(OrderResponse::new(&order)))
}

/// POST /order/{order_id}/product/{product_id}/decrement
#[tracing::instrument(skip(state))]
pub async fn decrement_product(
    State(state): State<Arc<AppState>>,
    Path((order_id, product_id)): Path<(String, String)>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = execute(
        &state,
        OrderCommand::DecrementProductCount {
            order_id: order_id.into(),
            product_id: product_id.into(),
        },
    )
    .await?;
    Ok(Json(OrderResponse::new(&order)))
}

/// POST /order/{order_id}/confirm
#[tracing::instrument(skip(state))]
pub async fn confirm(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = execute(&state, OrderCommand::ConfirmOrder { order_id: order_id.into() }).await?;
    Ok(Json(OrderResponse::new(&order)))
}

/// POST /order/{order_id}/ship
#[tracing::instrument(skip(state))]
pub async fn ship(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = execute(&state, OrderCommand::ShipOrder { order_id: order_id.into() }).await?;
    Ok(Json(OrderResponse::new(&order)))
}

/// GET /all-orders: every known order, sorted by ID.
#[tracing::instrument(skip(state))]
pub async fn list(State(state): State<Arc<AppState>>) -> Json<Vec<OrderResponse>> {
    let orders = state.projection.list_orders().await;
    Json(orders.iter().map(|o| OrderResponse::new(o)).collect())
}

/// GET /orders/{order_id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .projection
        .get_order(&OrderId::new(order_id.as_str()))
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Order {order_id} not found")))?;
    Ok(Json(OrderResponse::new(&order)))
}

/// GET /total-shipped/{product_id}: quantity shipped across all orders.
#[tracing::instrument(skip(state))]
pub async fn total_shipped(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<String>,
) -> Json<u64> {
    Json(
        state
            .projection
            .total_shipped(&ProductId::new(product_id))
            .await,
    )
}

// -- Helpers --

async fn create_order(
    state: &AppState,
    order_id: OrderId,
) -> Result<(StatusCode, Json<OrderCreatedResponse>), ApiError> {
    let order = execute(state, OrderCommand::CreateOrder { order_id }).await?;
    Ok((
        StatusCode::CREATED,
        Json(OrderCreatedResponse {
            order_id: order.order_id().to_string(),
        }),
    ))
}

async fn execute(state: &AppState, command: OrderCommand) -> Result<Arc<Order>, ApiError> {
    let name = command.name();
    tracing::debug!(command = name, order_id = %command.order_id(), "executing command");

    let outcome = state.projection.ingest(command.into_event()).await;
    let result = if outcome.is_ok() { "ok" } else { "rejected" };
    metrics::counter!("api_commands_total", "command" => name, "result" => result).increment(1);

    Ok(outcome?)
}
