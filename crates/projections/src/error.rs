//! Projection error types.

use common::OrderId;
use domain::{ApplyError, FailureKind};
use thiserror::Error;

/// Errors returned to callers that ingest events.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    /// The event could not be applied; the projection is unchanged.
    #[error("Event rejected: {0}")]
    Rejected(#[from] ApplyError),

    /// The ingestion pool has been shut down.
    #[error("Ingestion is shutting down")]
    ShuttingDown,
}

impl IngestError {
    /// Returns the failure kind of a rejected event.
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            IngestError::Rejected(err) => Some(err.kind()),
            IngestError::ShuttingDown => None,
        }
    }
}

/// Errors reported to a single subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    /// The subscriber did not keep up and its buffer overflowed.
    #[error("Subscription on order {order_id} lagged behind (buffer of {capacity} updates)")]
    Lagged { order_id: OrderId, capacity: usize },

    /// The registry no longer accepts subscriptions.
    #[error("Subscription registry is closed")]
    RegistryClosed,
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;
