//! Domain event trait.

use common::OrderId;
use serde::{Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and should be named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name.
    ///
    /// Used for log fields and metric labels.
    fn event_type(&self) -> &'static str;

    /// Returns the identifier of the aggregate this event belongs to.
    ///
    /// Ingestion partitions and orders events by this identifier.
    fn aggregate_id(&self) -> &OrderId;
}
