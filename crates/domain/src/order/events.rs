//! Order domain events.

use common::{OrderId, ProductId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

/// Events that can occur on an order aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Order was created.
    OrderCreated(OrderData),

    /// Product was put on the order with quantity one.
    ProductAdded(ProductLineData),

    /// Product quantity went up by one.
    ProductCountIncremented(ProductLineData),

    /// Product quantity went down by one.
    ProductCountDecremented(ProductLineData),

    /// Product was taken off the order.
    ProductRemoved(ProductLineData),

    /// Order was confirmed.
    OrderConfirmed(OrderData),

    /// Order was shipped.
    OrderShipped(OrderData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderCreated(_) => "OrderCreated",
            OrderEvent::ProductAdded(_) => "ProductAdded",
            OrderEvent::ProductCountIncremented(_) => "ProductCountIncremented",
            OrderEvent::ProductCountDecremented(_) => "ProductCountDecremented",
            OrderEvent::ProductRemoved(_) => "ProductRemoved",
            OrderEvent::OrderConfirmed(_) => "OrderConfirmed",
            OrderEvent::OrderShipped(_) => "OrderShipped",
        }
    }

    fn aggregate_id(&self) -> &OrderId {
        self.order_id()
    }
}

/// Payload of events that only name the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderData {
    /// The order the event belongs to.
    pub order_id: OrderId,
}

/// Payload of events that touch a single product line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductLineData {
    /// The order the event belongs to.
    pub order_id: OrderId,

    /// The product line affected.
    pub product_id: ProductId,
}

impl OrderEvent {
    /// Returns the order this event targets.
    pub fn order_id(&self) -> &OrderId {
        match self {
            OrderEvent::OrderCreated(data)
            | OrderEvent::OrderConfirmed(data)
            | OrderEvent::OrderShipped(data) => &data.order_id,
            OrderEvent::ProductAdded(data)
            | OrderEvent::ProductCountIncremented(data)
            | OrderEvent::ProductCountDecremented(data)
            | OrderEvent::ProductRemoved(data) => &data.order_id,
        }
    }

    /// Returns the product line this event touches, if any.
    pub fn product_id(&self) -> Option<&ProductId> {
        match self {
            OrderEvent::ProductAdded(data)
            | OrderEvent::ProductCountIncremented(data)
            | OrderEvent::ProductCountDecremented(data)
            | OrderEvent::ProductRemoved(data) => Some(&data.product_id),
            _ => None,
        }
    }
}

// Convenience constructors for events
impl OrderEvent {
    /// Creates an OrderCreated event.
    pub fn order_created(order_id: impl Into<OrderId>) -> Self {
        OrderEvent::OrderCreated(OrderData {
            order_id: order_id.into(),
        })
    }

    /// Creates a ProductAdded event.
    pub fn product_added(order_id: impl Into<OrderId>, product_id: impl Into<ProductId>) -> Self {
        OrderEvent::ProductAdded(ProductLineData::new(order_id, product_id))
    }

    /// Creates a ProductCountIncremented event.
    pub fn product_count_incremented(
        order_id: impl Into<OrderId>,
        product_id: impl Into<ProductId>,
    ) -> Self {
        OrderEvent::ProductCountIncremented(ProductLineData::new(order_id, product_id))
    }

    /// Creates a ProductCountDecremented event.
    pub fn product_count_decremented(
        order_id: impl Into<OrderId>,
        product_id: impl Into<ProductId>,
    ) -> Self {
        OrderEvent::ProductCountDecremented(ProductLineData::new(order_id, product_id))
    }

    /// Creates a ProductRemoved event.
    pub fn product_removed(order_id: impl Into<OrderId>, product_id: impl Into<ProductId>) -> Self {
        OrderEvent::ProductRemoved(ProductLineData::new(order_id, product_id))
    }

    /// Creates an OrderConfirmed event.
    pub fn order_confirmed(order_id: impl Into<OrderId>) -> Self {
        OrderEvent::OrderConfirmed(OrderData {
            order_id: order_id.into(),
        })
    }

    /// Creates an OrderShipped event.
    pub fn order_shipped(order_id: impl Into<OrderId>) -> Self {
        OrderEvent::OrderShipped(OrderData {
            order_id: order_id.into(),
        })
    }
}

impl ProductLineData {
    fn new(order_id: impl Into<OrderId>, product_id: impl Into<ProductId>) -> Self {
        Self {
            order_id: order_id.into(),
            product_id: product_id.into(),
        }
    }
}
