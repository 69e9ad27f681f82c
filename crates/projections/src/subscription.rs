//! Live order subscriptions.
//!
//! A subscription delivers the current state of one order, then the state
//! after every event applied to it afterwards, in commit order:
//!
//! ```text
//! Open ──(initial snapshot handed out)──► Streaming ──(cancel / drop / shutdown / lag)──► Closed
//! ```
//!
//! Each subscription owns a bounded channel. Notification uses `try_send`,
//! so ingestion never waits for a subscriber. A subscriber whose buffer is
//! full is dropped from the index and told it lagged; nobody else notices.
//! States already covered by the initial snapshot are not queued at all.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll, ready};

use common::OrderId;
use domain::Order;
use futures_core::Stream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::SubscriptionError;
use crate::store::ProjectionStore;

/// Unique identifier of a subscription within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Lifecycle of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Registered, initial snapshot not yet read.
    Open,
    /// Initial snapshot handed out; updates are flowing.
    Streaming,
    /// No further delivery.
    Closed,
}

struct Subscriber {
    id: SubscriptionId,
    sender: mpsc::Sender<Arc<Order>>,
    lagged: Arc<AtomicBool>,
    /// Version of the initial snapshot; nothing at or below it is queued.
    floor: Arc<AtomicU64>,
}

struct RegistryInner {
    store: ProjectionStore,
    capacity: usize,
    next_id: AtomicU64,
    closed: AtomicBool,
    subscribers: Mutex<HashMap<OrderId, Vec<Subscriber>>>,
}

impl RegistryInner {
    fn subscribers(&self) -> MutexGuard<'_, HashMap<OrderId, Vec<Subscriber>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, order_id: &OrderId, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers();
        let Some(list) = subscribers.get_mut(order_id) else {
            return false;
        };
        let before = list.len();
        list.retain(|s| s.id != id);
        let removed = before != list.len();
        if list.is_empty() {
            subscribers.remove(order_id);
        }
        if removed {
            metrics::gauge!("subscriptions_active").decrement(1.0);
        }
        removed
    }
}

/// Tracks live subscriptions, indexed by the order they watch.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    inner: Arc<RegistryInner>,
}

impl SubscriptionRegistry {
    /// Creates a registry that reads initial snapshots from `store` and
    /// buffers up to `capacity` updates per subscription.
    pub fn new(store: ProjectionStore, capacity: usize) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                store,
                capacity: capacity.max(1),
                next_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
                subscribers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Opens a live query on one order.
    ///
    /// The returned subscription carries the current state of the order
    /// (`None` if it does not exist yet) and yields every later state.
    #[tracing::instrument(skip(self))]
    pub async fn subscribe(
        &self,
        order_id: OrderId,
    ) -> Result<OrderSubscription, SubscriptionError> {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(self.inner.capacity);
        let lagged = Arc::new(AtomicBool::new(false));
        let floor = Arc::new(AtomicU64::new(0));

        {
            let mut subscribers = self.inner.subscribers();
            if self.inner.closed.load(Ordering::Acquire) {
                return Err(SubscriptionError::RegistryClosed);
            }
            subscribers
                .entry(order_id.clone())
                .or_default()
                .push(Subscriber {
                    id,
                    sender,
                    lagged: Arc::clone(&lagged),
                    floor: Arc::clone(&floor),
                });
        }
        metrics::gauge!("subscriptions_active").increment(1.0);

        let mut subscription = OrderSubscription {
            id,
            order_id,
            initial: None,
            receiver: Some(receiver),
            last_version: 0,
            lagged,
            capacity: self.inner.capacity,
            state: SubscriptionState::Open,
            registry: Arc::downgrade(&self.inner),
        };

        // Registered before reading: every commit after this read reaches the
        // channel, and anything older is filtered out by version.
        let initial = self.inner.store.get(&subscription.order_id).await;
        subscription.last_version = initial.as_ref().map_or(0, |o| o.version());
        floor.fetch_max(subscription.last_version, Ordering::AcqRel);
        subscription.initial = initial;
        subscription.state = SubscriptionState::Streaming;

        tracing::debug!(
            subscription = %id,
            version = subscription.last_version,
            "subscription opened"
        );

        Ok(subscription)
    }

    /// Pushes the post-event state of an order to everyone watching it.
    ///
    /// Never blocks. Returns the number of subscribers the update was
    /// queued for.
    pub fn notify(&self, order: &Arc<Order>) -> usize {
        let mut subscribers = self.inner.subscribers();
        let Some(list) = subscribers.get_mut(order.order_id()) else {
            return 0;
        };

        let before = list.len();
        let mut delivered = 0;
        list.retain(|subscriber| {
            if order.version() <= subscriber.floor.load(Ordering::Acquire) {
                return true;
            }
            match subscriber.sender.try_send(Arc::clone(order)) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    subscriber.lagged.store(true, Ordering::Release);
                    metrics::counter!("subscription_overflows_total").increment(1);
                    tracing::warn!(
                        subscription = %subscriber.id,
                        order_id = %order.order_id(),
                        capacity = self.inner.capacity,
                        "subscriber buffer full, dropping subscription"
                    );
                    false
                }
                Err(TrySendError::Closed(_)) => false,
            }
        });

        let removed = before - list.len();
        if list.is_empty() {
            subscribers.remove(order.order_id());
        }
        drop(subscribers);

        if removed > 0 {
            metrics::gauge!("subscriptions_active").decrement(removed as f64);
        }
        metrics::counter!("subscription_updates_delivered_total").increment(delivered as u64);

        delivered
    }

    /// Removes a subscription from the index. Returns false if it was not registered.
    pub fn unsubscribe(&self, order_id: &OrderId, id: SubscriptionId) -> bool {
        self.inner.remove(order_id, id)
    }

    /// Returns the number of subscriptions watching an order.
    pub fn subscriber_count(&self, order_id: &OrderId) -> usize {
        self.inner.subscribers().get(order_id).map_or(0, Vec::len)
    }

    /// Returns the number of live subscriptions across all orders.
    pub fn active_subscriptions(&self) -> usize {
        self.inner.subscribers().values().map(Vec::len).sum()
    }

    /// Returns true once [`shutdown`](Self::shutdown) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Closes every subscription and refuses new ones.
    ///
    /// Subscribers still receive what was already buffered, then their
    /// stream ends.
    pub fn shutdown(&self) {
        let drained: usize = {
            let mut subscribers = self.inner.subscribers();
            self.inner.closed.store(true, Ordering::Release);
            subscribers.drain().map(|(_, list)| list.len()).sum()
        };
        if drained > 0 {
            metrics::gauge!("subscriptions_active").decrement(drained as f64);
        }
        tracing::info!(closed = drained, "subscription registry shut down");
    }
}

/// Client handle of a live query on one order.
///
/// Dropping the handle unregisters it.
pub struct OrderSubscription {
    id: SubscriptionId,
    order_id: OrderId,
    initial: Option<Arc<Order>>,
    receiver: Option<mpsc::Receiver<Arc<Order>>>,
    last_version: u64,
    lagged: Arc<AtomicBool>,
    capacity: usize,
    state: SubscriptionState,
    registry: Weak<RegistryInner>,
}

impl OrderSubscription {
    /// Returns the subscription ID.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns the watched order.
    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    /// Returns the state of the order when the subscription was opened.
    pub fn initial(&self) -> Option<&Arc<Order>> {
        self.initial.as_ref()
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    /// Waits for the next state of the order.
    ///
    /// Returns `None` once the subscription is closed. A subscriber that
    /// lagged gets its buffered updates, then one `Lagged` error, then `None`.
    pub async fn next_update(&mut self) -> Option<Result<Arc<Order>, SubscriptionError>> {
        std::future::poll_fn(|cx| self.poll_update(cx)).await
    }

    /// Stops delivery. Nothing is received after this returns.
    pub fn cancel(&mut self) {
        self.unregister();
        self.close();
        tracing::debug!(subscription = %self.id, "subscription cancelled");
    }

    fn poll_update(
        &mut self,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Arc<Order>, SubscriptionError>>> {
        loop {
            let Some(receiver) = self.receiver.as_mut() else {
                return Poll::Ready(None);
            };
            match ready!(receiver.poll_recv(cx)) {
                Some(order) => {
                    if order.version() <= self.last_version {
                        continue;
                    }
                    self.last_version = order.version();
                    return Poll::Ready(Some(Ok(order)));
                }
                None => {
                    self.close();
                    if self.lagged.swap(false, Ordering::AcqRel) {
                        return Poll::Ready(Some(Err(SubscriptionError::Lagged {
                            order_id: self.order_id.clone(),
                            capacity: self.capacity,
                        })));
                    }
                    return Poll::Ready(None);
                }
            }
        }
    }

    fn close(&mut self) {
        self.receiver = None;
        self.state = SubscriptionState::Closed;
    }

    fn unregister(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.order_id, self.id);
        }
    }
}

impl Stream for OrderSubscription {
    type Item = Result<Arc<Order>, SubscriptionError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().poll_update(cx)
    }
}

impl Drop for OrderSubscription {
    fn drop(&mut self) {
        self.unregister();
    }
}

impl std::fmt::Debug for OrderSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderSubscription")
            .field("id", &self.id)
            .field("order_id", &self.order_id)
            .field("state", &self.state)
            .field("last_version", &self.last_version)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{OrderEvent, replay};

    fn history(id: &str, len: usize) -> Vec<OrderEvent> {
        let mut events = vec![OrderEvent::order_created(id)];
        for _ in 1..len {
            events.push(OrderEvent::product_count_incremented(id, "chair"));
        }
        events
    }

    /// State of `id` after `version` events.
    fn at_version(id: &str, version: usize) -> Arc<Order> {
        Arc::new(replay(&history(id, version)).unwrap().unwrap())
    }

    #[tokio::test]
    async fn test_subscribe_to_absent_order() {
        let registry = SubscriptionRegistry::new(ProjectionStore::new(), 8);
        let subscription = registry.subscribe(OrderId::new("o1")).await.unwrap();

        assert!(subscription.initial().is_none());
        assert_eq!(subscription.state(), SubscriptionState::Streaming);
        assert_eq!(registry.subscriber_count(&OrderId::new("o1")), 1);
    }

    #[tokio::test]
    async fn test_subscribe_to_existing_order_gets_snapshot() {
        let store = ProjectionStore::new();
        store.put(at_version("o1", 2)).await;
        let registry = SubscriptionRegistry::new(store, 8);

        let subscription = registry.subscribe(OrderId::new("o1")).await.unwrap();

        assert_eq!(subscription.initial().unwrap().version(), 2);
    }

    #[tokio::test]
    async fn test_updates_arrive_in_order() {
        let registry = SubscriptionRegistry::new(ProjectionStore::new(), 8);
        let mut subscription = registry.subscribe(OrderId::new("o1")).await.unwrap();

        for version in 1..=3 {
            assert_eq!(registry.notify(&at_version("o1", version)), 1);
        }

        for version in 1..=3 {
            let update = subscription.next_update().await.unwrap().unwrap();
            assert_eq!(update.version(), version as u64);
        }
    }

    #[tokio::test]
    async fn test_other_orders_are_not_delivered() {
        let registry = SubscriptionRegistry::new(ProjectionStore::new(), 8);
        let _subscription = registry.subscribe(OrderId::new("o1")).await.unwrap();

        assert_eq!(registry.notify(&at_version("o2", 1)), 0);
    }

    #[tokio::test]
    async fn test_stale_updates_are_skipped() {
        let store = ProjectionStore::new();
        store.put(at_version("o1", 2)).await;
        let registry = SubscriptionRegistry::new(store, 8);
        let mut subscription = registry.subscribe(OrderId::new("o1")).await.unwrap();

        // Commit landed before the initial read but its notification after it.
        registry.notify(&at_version("o1", 2));
        registry.notify(&at_version("o1", 3));

        let update = subscription.next_update().await.unwrap().unwrap();
        assert_eq!(update.version(), 3);
    }

    #[tokio::test]
    async fn test_stale_updates_do_not_use_buffer_space() {
        let store = ProjectionStore::new();
        store.put(at_version("o1", 2)).await;
        let registry = SubscriptionRegistry::new(store, 1);
        let mut subscription = registry.subscribe(OrderId::new("o1")).await.unwrap();

        assert_eq!(registry.notify(&at_version("o1", 2)), 0);
        assert_eq!(registry.notify(&at_version("o1", 3)), 1);

        assert_eq!(registry.subscriber_count(&OrderId::new("o1")), 1);
        let update = subscription.next_update().await.unwrap().unwrap();
        assert_eq!(update.version(), 3);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags_without_affecting_others() {
        let registry = SubscriptionRegistry::new(ProjectionStore::new(), 2);
        let mut fast = registry.subscribe(OrderId::new("o1")).await.unwrap();
        let mut slow = registry.subscribe(OrderId::new("o1")).await.unwrap();

        for version in 1..=3 {
            registry.notify(&at_version("o1", version));
            let update = fast.next_update().await.unwrap().unwrap();
            assert_eq!(update.version(), version as u64);
        }

        assert_eq!(registry.subscriber_count(&OrderId::new("o1")), 1);

        assert_eq!(slow.next_update().await.unwrap().unwrap().version(), 1);
        assert_eq!(slow.next_update().await.unwrap().unwrap().version(), 2);
        assert_eq!(
            slow.next_update().await.unwrap().unwrap_err(),
            SubscriptionError::Lagged {
                order_id: OrderId::new("o1"),
                capacity: 2,
            }
        );
        assert!(slow.next_update().await.is_none());
        assert_eq!(slow.state(), SubscriptionState::Closed);

        registry.notify(&at_version("o1", 4));
        assert_eq!(fast.next_update().await.unwrap().unwrap().version(), 4);
    }

    #[tokio::test]
    async fn test_cancel_stops_delivery() {
        let registry = SubscriptionRegistry::new(ProjectionStore::new(), 8);
        let mut subscription = registry.subscribe(OrderId::new("o1")).await.unwrap();
        registry.notify(&at_version("o1", 1));

        subscription.cancel();

        assert_eq!(subscription.state(), SubscriptionState::Closed);
        assert_eq!(registry.subscriber_count(&OrderId::new("o1")), 0);
        assert_eq!(registry.notify(&at_version("o1", 2)), 0);
        assert!(subscription.next_update().await.is_none());
    }

    #[tokio::test]
    async fn test_drop_unregisters() {
        let registry = SubscriptionRegistry::new(ProjectionStore::new(), 8);
        let subscription = registry.subscribe(OrderId::new("o1")).await.unwrap();
        assert_eq!(registry.active_subscriptions(), 1);

        drop(subscription);

        assert_eq!(registry.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_by_id() {
        let registry = SubscriptionRegistry::new(ProjectionStore::new(), 8);
        let mut subscription = registry.subscribe(OrderId::new("o1")).await.unwrap();

        assert!(registry.unsubscribe(&OrderId::new("o1"), subscription.id()));
        assert!(!registry.unsubscribe(&OrderId::new("o1"), subscription.id()));
        assert!(subscription.next_update().await.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_closes_subscriptions() {
        let registry = SubscriptionRegistry::new(ProjectionStore::new(), 8);
        let mut subscription = registry.subscribe(OrderId::new("o1")).await.unwrap();
        registry.notify(&at_version("o1", 1));

        registry.shutdown();

        assert!(registry.is_closed());
        assert_eq!(subscription.next_update().await.unwrap().unwrap().version(), 1);
        assert!(subscription.next_update().await.is_none());
        assert_eq!(subscription.state(), SubscriptionState::Closed);
        assert_eq!(
            registry.subscribe(OrderId::new("o1")).await.unwrap_err(),
            SubscriptionError::RegistryClosed
        );
    }

    #[tokio::test]
    async fn test_subscription_is_a_stream() {
        use futures_util::StreamExt;

        let registry = SubscriptionRegistry::new(ProjectionStore::new(), 8);
        let subscription = registry.subscribe(OrderId::new("o1")).await.unwrap();
        registry.notify(&at_version("o1", 1));
        registry.notify(&at_version("o1", 2));
        registry.shutdown();

        let versions: Vec<u64> = subscription
            .map(|update| update.unwrap().version())
            .collect()
            .await;
        assert_eq!(versions, vec![1, 2]);
    }
}
