//! The order projection facade.

use std::sync::Arc;

use common::{OrderId, ProductId};
use domain::{Order, OrderEvent};

use crate::config::ProjectionConfig;
use crate::error::{Result, SubscriptionError};
use crate::pool::IngestionPool;
use crate::processor::ProjectionProcessor;
use crate::projection::{EventIngestor, ProjectionPosition};
use crate::query::OrderQueries;
use crate::store::ProjectionStore;
use crate::subscription::{OrderSubscription, SubscriptionRegistry};

/// Wires the store, the query engine, the subscription registry and the
/// ingestion pool together.
///
/// Cheap to clone; clones share the same projection.
#[derive(Clone)]
pub struct OrderProjection {
    config: ProjectionConfig,
    queries: OrderQueries,
    registry: SubscriptionRegistry,
    ingestor: Arc<EventIngestor>,
    pool: Arc<IngestionPool>,
}

impl OrderProjection {
    /// Creates an empty projection and starts its ingestion workers.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: ProjectionConfig) -> Self {
        let store = ProjectionStore::new();
        let registry = SubscriptionRegistry::new(store.clone(), config.subscription_capacity);
        let ingestor = Arc::new(EventIngestor::new(store.clone(), registry.clone()));
        let pool = Arc::new(IngestionPool::new(
            Arc::clone(&ingestor),
            config.workers,
            config.ingest_queue_capacity,
        ));

        Self {
            config,
            queries: OrderQueries::new(store),
            registry,
            ingestor,
            pool,
        }
    }

    /// Returns the configuration this projection was built with.
    pub fn config(&self) -> ProjectionConfig {
        self.config
    }

    /// Applies an event and returns the new state of its order.
    pub async fn ingest(&self, event: OrderEvent) -> Result<Arc<Order>> {
        self.pool.ingest(event).await
    }

    /// Queues an event without waiting for the outcome.
    pub async fn submit(&self, event: OrderEvent) -> Result<()> {
        self.pool.submit(event).await
    }

    /// Waits until every event queued so far has been handled.
    pub async fn sync(&self) -> Result<()> {
        self.pool.sync().await
    }

    /// Returns the current state of an order, or `None` if it was never created.
    pub async fn get_order(&self, order_id: &OrderId) -> Option<Arc<Order>> {
        self.queries.get_order(order_id).await
    }

    /// Returns every known order, sorted by ID.
    pub async fn list_orders(&self) -> Vec<Arc<Order>> {
        self.queries.list_orders().await
    }

    /// Returns the quantity of a product across all shipped orders.
    pub async fn total_shipped(&self, product_id: &ProductId) -> u64 {
        self.queries.total_shipped(product_id).await
    }

    /// Opens a live query on one order.
    pub async fn subscribe(
        &self,
        order_id: OrderId,
    ) -> std::result::Result<OrderSubscription, SubscriptionError> {
        self.registry.subscribe(order_id).await
    }

    /// Returns how many events have been applied and rejected so far.
    pub fn position(&self) -> ProjectionPosition {
        self.ingestor.position()
    }

    /// Returns the query service over the shared store.
    pub fn queries(&self) -> &OrderQueries {
        &self.queries
    }

    /// Returns the subscription registry.
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Returns a processor for draining external feeds into this projection.
    pub fn processor(&self) -> ProjectionProcessor {
        ProjectionProcessor::new(Arc::clone(&self.pool), Arc::clone(&self.ingestor))
    }

    /// Drains queued events, then closes every subscription.
    ///
    /// Subscribers receive the updates for everything that was queued
    /// before their streams end.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
        self.registry.shutdown();
        tracing::info!(position = %self.position(), "projection shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::OrderStatus;

    #[tokio::test]
    async fn test_facade_round_trip() {
        let projection = OrderProjection::new(ProjectionConfig::default().with_workers(2));

        projection
            .ingest(OrderEvent::order_created("o1"))
            .await
            .unwrap();
        projection
            .ingest(OrderEvent::product_added("o1", "chair"))
            .await
            .unwrap();

        let order = projection.get_order(&OrderId::new("o1")).await.unwrap();
        assert_eq!(order.status(), OrderStatus::Created);
        assert_eq!(projection.list_orders().await.len(), 1);
        assert_eq!(projection.total_shipped(&ProductId::new("chair")).await, 0);
        assert_eq!(projection.position().events_applied, 2);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let projection = OrderProjection::new(ProjectionConfig::default());
        let other = projection.clone();

        projection
            .ingest(OrderEvent::order_created("o1"))
            .await
            .unwrap();

        assert!(other.get_order(&OrderId::new("o1")).await.is_some());
    }

    #[tokio::test]
    async fn test_shutdown_refuses_work() {
        let projection = OrderProjection::new(ProjectionConfig::default());
        projection.shutdown().await;

        assert_eq!(
            projection
                .ingest(OrderEvent::order_created("o1"))
                .await
                .unwrap_err(),
            crate::IngestError::ShuttingDown
        );
        assert_eq!(
            projection.subscribe(OrderId::new("o1")).await.unwrap_err(),
            SubscriptionError::RegistryClosed
        );
    }
}
