//! Order state and the event applier.

use std::collections::BTreeMap;

use common::{OrderId, ProductId};
use serde::Serialize;

use crate::error::ApplyError;

use super::{OrderEvent, OrderStatus};

/// Query-side state of one order.
///
/// Only produced by [`apply`], which keeps every quantity strictly positive
/// and only moves the status forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    /// Unique order identifier.
    order_id: OrderId,

    /// Quantity per product. Absent means zero.
    products: BTreeMap<ProductId, u32>,

    /// Current lifecycle status.
    status: OrderStatus,

    /// Number of events applied so far. Creation yields 1.
    version: u64,
}

impl Order {
    fn created(order_id: OrderId) -> Self {
        Self {
            order_id,
            products: BTreeMap::new(),
            status: OrderStatus::Created,
            version: 1,
        }
    }

    /// Returns the order ID.
    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    /// Returns the product quantities.
    pub fn products(&self) -> &BTreeMap<ProductId, u32> {
        &self.products
    }

    /// Returns the quantity of a product, zero when it is not on the order.
    pub fn quantity_of(&self, product_id: &ProductId) -> u32 {
        self.products.get(product_id).copied().unwrap_or(0)
    }

    /// Returns the sum of all product quantities.
    pub fn total_quantity(&self) -> u64 {
        self.products.values().map(|&q| u64::from(q)).sum()
    }

    /// Returns the current status.
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Returns true once the order has shipped.
    pub fn is_shipped(&self) -> bool {
        self.status == OrderStatus::Shipped
    }

    /// Returns the number of events applied to this order.
    pub fn version(&self) -> u64 {
        self.version
    }

    fn transition(
        &mut self,
        allowed: bool,
        to: OrderStatus,
        action: &'static str,
    ) -> Result<(), ApplyError> {
        if !allowed {
            return Err(ApplyError::InvalidTransition {
                order_id: self.order_id.clone(),
                status: self.status,
                action,
            });
        }
        self.status = to;
        Ok(())
    }

    fn unknown_product(&self, product_id: &ProductId) -> ApplyError {
        ApplyError::UnknownProduct {
            order_id: self.order_id.clone(),
            product_id: product_id.clone(),
        }
    }
}

/// Applies one event to the current state of its order.
///
/// `current` is `None` when the order has never been created. The input is
/// never modified; on failure nothing changes.
pub fn apply(current: Option<&Order>, event: &OrderEvent) -> Result<Order, ApplyError> {
    let Some(current) = current else {
        return match event {
            OrderEvent::OrderCreated(data) => Ok(Order::created(data.order_id.clone())),
            _ => Err(ApplyError::UnknownOrder {
                order_id: event.order_id().clone(),
            }),
        };
    };

    let mut next = current.clone();

    match event {
        OrderEvent::OrderCreated(data) => {
            return Err(ApplyError::DuplicateCreation {
                order_id: data.order_id.clone(),
            });
        }
        OrderEvent::ProductAdded(data) => {
            // A repeated add leaves the quantity alone; increments are their own event.
            next.products.entry(data.product_id.clone()).or_insert(1);
        }
        OrderEvent::ProductCountIncremented(data) => {
            let quantity = next.products.entry(data.product_id.clone()).or_insert(0);
            *quantity = quantity.checked_add(1).ok_or_else(|| ApplyError::QuantityOverflow {
                order_id: current.order_id.clone(),
                product_id: data.product_id.clone(),
            })?;
        }
        OrderEvent::ProductCountDecremented(data) => {
            let remaining = match next.products.get(&data.product_id) {
                Some(&quantity) => quantity - 1,
                None => return Err(next.unknown_product(&data.product_id)),
            };
            if remaining == 0 {
                next.products.remove(&data.product_id);
            } else {
                next.products.insert(data.product_id.clone(), remaining);
            }
        }
        OrderEvent::ProductRemoved(data) => {
            if next.products.remove(&data.product_id).is_none() {
                return Err(next.unknown_product(&data.product_id));
            }
        }
        OrderEvent::OrderConfirmed(_) => {
            next.transition(next.status.can_confirm(), OrderStatus::Confirmed, "confirm")?;
        }
        OrderEvent::OrderShipped(_) => {
            next.transition(next.status.can_ship(), OrderStatus::Shipped, "ship")?;
        }
    }

    next.version += 1;
    Ok(next)
}

/// Folds a sequence of events for a single order, stopping at the first failure.
pub fn replay<'a>(
    events: impl IntoIterator<Item = &'a OrderEvent>,
) -> Result<Option<Order>, ApplyError> {
    let mut state: Option<Order> = None;
    for event in events {
        state = Some(apply(state.as_ref(), event)?);
    }
    Ok(state)
}
