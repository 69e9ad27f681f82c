//! Domain error types.

use common::{OrderId, ProductId};
use serde::Serialize;
use thiserror::Error;

use crate::order::OrderStatus;

/// Reasons an event cannot be applied to the current projection.
///
/// The applier returns these instead of panicking; the ingestion loop
/// drops the offending event and carries on with the next one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// A creation event arrived for an order that already exists.
    #[error("Order {order_id} already exists")]
    DuplicateCreation { order_id: OrderId },

    /// A mutating event arrived for an order that was never created.
    #[error("Order {order_id} does not exist")]
    UnknownOrder { order_id: OrderId },

    /// The order is not in a status that allows the requested change.
    #[error("Invalid state transition for order {order_id}: cannot {action} from {status} status")]
    InvalidTransition {
        order_id: OrderId,
        status: OrderStatus,
        action: &'static str,
    },

    /// The product is not present on the order.
    #[error("Product {product_id} is not on order {order_id}")]
    UnknownProduct {
        order_id: OrderId,
        product_id: ProductId,
    },

    /// The product quantity is already at its maximum.
    #[error(
        "Product {product_id} on order {order_id} cannot be incremented past {max}",
        max = u32::MAX
    )]
    QuantityOverflow {
        order_id: OrderId,
        product_id: ProductId,
    },
}

impl ApplyError {
    /// Returns the failure category.
    pub fn kind(&self) -> FailureKind {
        match self {
            ApplyError::DuplicateCreation { .. } => FailureKind::DuplicateCreation,
            ApplyError::UnknownOrder { .. } => FailureKind::UnknownOrder,
            ApplyError::InvalidTransition { .. } => FailureKind::InvalidTransition,
            ApplyError::UnknownProduct { .. } => FailureKind::UnknownProduct,
            ApplyError::QuantityOverflow { .. } => FailureKind::QuantityOverflow,
        }
    }

    /// Returns the order the failed event targeted.
    pub fn order_id(&self) -> &OrderId {
        match self {
            ApplyError::DuplicateCreation { order_id }
            | ApplyError::UnknownOrder { order_id }
            | ApplyError::InvalidTransition { order_id, .. }
            | ApplyError::UnknownProduct { order_id, .. }
            | ApplyError::QuantityOverflow { order_id, .. } => order_id,
        }
    }
}

/// Category of an [`ApplyError`], without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FailureKind {
    DuplicateCreation,
    UnknownOrder,
    InvalidTransition,
    UnknownProduct,
    QuantityOverflow,
}

impl FailureKind {
    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::DuplicateCreation => "DuplicateCreation",
            FailureKind::UnknownOrder => "UnknownOrder",
            FailureKind::InvalidTransition => "InvalidTransition",
            FailureKind::UnknownProduct => "UnknownProduct",
            FailureKind::QuantityOverflow => "QuantityOverflow",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
