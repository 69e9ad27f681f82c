//! Order commands issued by the HTTP adapter.

use common::{OrderId, ProductId};
use serde::{Deserialize, Serialize};

use super::OrderEvent;

/// An intent to change an order.
///
/// Each command maps onto exactly one event. Whether the event can be
/// applied is decided by the applier at ingestion time, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum OrderCommand {
    CreateOrder {
        order_id: OrderId,
    },
    AddProduct {
        order_id: OrderId,
        product_id: ProductId,
    },
    IncrementProductCount {
        order_id: OrderId,
        product_id: ProductId,
    },
    DecrementProductCount {
        order_id: OrderId,
        product_id: ProductId,
    },
    ConfirmOrder {
        order_id: OrderId,
    },
    ShipOrder {
        order_id: OrderId,
    },
}

impl OrderCommand {
    /// Returns the command name.
    pub fn name(&self) -> &'static str {
        match self {
            OrderCommand::CreateOrder { .. } => "CreateOrder",
            OrderCommand::AddProduct { .. } => "AddProduct",
            OrderCommand::IncrementProductCount { .. } => "IncrementProductCount",
            OrderCommand::DecrementProductCount { .. } => "DecrementProductCount",
            OrderCommand::ConfirmOrder { .. } => "ConfirmOrder",
            OrderCommand::ShipOrder { .. } => "ShipOrder",
        }
    }

    /// Returns the targeted order.
    pub fn order_id(&self) -> &OrderId {
        match self {
            OrderCommand::CreateOrder { order_id }
            | OrderCommand::AddProduct { order_id, .. }
            | OrderCommand::IncrementProductCount { order_id, .. }
            | OrderCommand::DecrementProductCount { order_id, .. }
            | OrderCommand::ConfirmOrder { order_id }
            | OrderCommand::ShipOrder { order_id } => order_id,
        }
    }

    /// Converts the command into the event it records.
    pub fn into_event(self) -> OrderEvent {
        match self {
            OrderCommand::CreateOrder { order_id } => OrderEvent::order_created(order_id),
            OrderCommand::AddProduct {
                order_id,
                product_id,
            } => OrderEvent::product_added(order_id, product_id),
            OrderCommand::IncrementProductCount {
                order_id,
                product_id,
            } => OrderEvent::product_count_incremented(order_id, product_id),
            OrderCommand::DecrementProductCount {
                order_id,
                product_id,
            } => OrderEvent::product_count_decremented(order_id, product_id),
            OrderCommand::ConfirmOrder { order_id } => OrderEvent::order_confirmed(order_id),
            OrderCommand::ShipOrder { order_id } => OrderEvent::order_shipped(order_id),
        }
    }
}
