//! Query engine over the projection store.

use std::sync::Arc;

use common::{OrderId, ProductId};
use domain::{Order, OrderStatus};

use crate::store::ProjectionStore;

/// Answers point, list and aggregate queries.
///
/// Every call works on one snapshot taken when it starts, so concurrent
/// ingestion can change the next answer but never tears the current one.
/// Missing data yields `None` or zero, never an error.
#[derive(Clone)]
pub struct OrderQueries {
    store: ProjectionStore,
}

impl OrderQueries {
    /// Creates a query engine reading from the given store.
    pub fn new(store: ProjectionStore) -> Self {
        Self { store }
    }

    /// Gets the current state of an order.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: &OrderId) -> Option<Arc<Order>> {
        self.store.get(order_id).await
    }

    /// Gets every known order, sorted by order ID.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self) -> Vec<Arc<Order>> {
        self.store.list().await
    }

    /// Gets every order currently in the given status.
    #[tracing::instrument(skip(self))]
    pub async fn orders_with_status(&self, status: OrderStatus) -> Vec<Arc<Order>> {
        self.store
            .snapshot()
            .await
            .orders()
            .into_iter()
            .filter(|o| o.status() == status)
            .collect()
    }

    /// Sums the quantity of a product across all shipped orders.
    #[tracing::instrument(skip(self))]
    pub async fn total_shipped(&self, product_id: &ProductId) -> u64 {
        let snapshot = self.store.snapshot().await;
        snapshot
            .iter()
            .filter(|o| o.is_shipped())
            .map(|o| u64::from(o.quantity_of(product_id)))
            .sum()
    }
}
