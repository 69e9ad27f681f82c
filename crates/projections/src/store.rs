//! Projection store: the authoritative map from order ID to current state.

use std::collections::HashMap;
use std::sync::Arc;

use common::OrderId;
use domain::Order;
use tokio::sync::RwLock;

type OrderMap = HashMap<OrderId, Arc<Order>>;

/// Copy-on-write map of every known order.
///
/// Readers clone the inner `Arc` and release the lock immediately, so a
/// snapshot stays valid while ingestion keeps writing. A write that finds
/// the map shared with a live snapshot clones the map (pointer copies of
/// the orders) before inserting, which keeps every snapshot untorn.
///
/// Writes must come from the ingestion loop only.
#[derive(Clone, Default)]
pub struct ProjectionStore {
    orders: Arc<RwLock<Arc<OrderMap>>>,
}

impl ProjectionStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the current state of an order.
    pub async fn get(&self, order_id: &OrderId) -> Option<Arc<Order>> {
        self.orders.read().await.get(order_id).cloned()
    }

    /// Replaces the state of an order atomically.
    pub async fn put(&self, order: Arc<Order>) {
        let mut orders = self.orders.write().await;
        Arc::make_mut(&mut *orders).insert(order.order_id().clone(), order);
    }

    /// Takes an immutable point-in-time view of all orders.
    pub async fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            orders: Arc::clone(&*self.orders.read().await),
        }
    }

    /// Lists all orders from a single snapshot, sorted by order ID.
    pub async fn list(&self) -> Vec<Arc<Order>> {
        self.snapshot().await.orders()
    }

    /// Returns the number of known orders.
    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Returns true if no order has been created yet.
    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}

/// Immutable view of the store at one point in time.
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    orders: Arc<OrderMap>,
}

impl StoreSnapshot {
    /// Gets an order from this snapshot.
    pub fn get(&self, order_id: &OrderId) -> Option<&Arc<Order>> {
        self.orders.get(order_id)
    }

    /// Iterates the orders in this snapshot in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Order>> {
        self.orders.values()
    }

    /// Returns the orders in this snapshot sorted by order ID.
    pub fn orders(&self) -> Vec<Arc<Order>> {
        let mut orders: Vec<_> = self.orders.values().cloned().collect();
        orders.sort_by(|a, b| a.order_id().cmp(b.order_id()));
        orders
    }

    /// Returns the number of orders in this snapshot.
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Returns true if this snapshot holds no orders.
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}
