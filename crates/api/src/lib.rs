//! HTTP API server for the order read model.
//!
//! Provides REST endpoints that issue order commands and query the
//! projection, a server-sent events stream of live order updates, and
//! observability through structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use projections::{OrderProjection, ProjectionConfig};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/ship-order", post(routes::orders::ship_order))
        .route(
            "/ship-unconfirmed-order",
            post(routes::orders::ship_unconfirmed_order),
        )
        .route("/order", post(routes::orders::create))
        .route("/order/{order_id}", post(routes::orders::create_with_id))
        .route(
            "/order/{order_id}/product/{product_id}",
            post(routes::orders::add_product),
        )
        .route(
            "/order/{order_id}/product/{product_id}/increment",
            post(routes::orders::increment_product),
        )
        .route(
            "/order/{order_id}/product/{product_id}/decrement",
            post(routes::orders::decrement_product),
        )
        .route("/order/{order_id}/confirm", post(routes::orders::confirm))
        .route("/order/{order_id}/ship", post(routes::orders::ship))
        .route("/all-orders", get(routes::orders::list))
        .route("/orders/{order_id}", get(routes::orders::get))
        .route(
            "/total-shipped/{product_id}",
            get(routes::orders::total_shipped),
        )
        .route(
            "/order-updates/{order_id}",
            get(routes::updates::order_updates),
        )
        .route("/events", post(routes::events::ingest))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state around a fresh, empty projection.
///
/// Must be called from within a Tokio runtime.
pub fn create_default_state(config: ProjectionConfig) -> Arc<AppState> {
    Arc::new(AppState {
        projection: OrderProjection::new(config),
    })
}
