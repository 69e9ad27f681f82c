//! Read model and live queries for orders.
//!
//! This crate provides the query side of the order system:
//! - [`ProjectionStore`], the copy-on-write map of current order states
//! - [`OrderQueries`] for point, list and aggregate queries
//! - [`SubscriptionRegistry`] and [`OrderSubscription`] for live queries
//! - [`EventIngestor`] and [`IngestionPool`], the ordered ingestion loop
//! - [`ProjectionProcessor`] for draining external event feeds
//! - [`OrderProjection`], the facade tying them together

pub mod config;
pub mod engine;
pub mod error;
pub mod pool;
pub mod processor;
pub mod projection;
pub mod query;
pub mod store;
pub mod subscription;

pub use config::ProjectionConfig;
pub use engine::OrderProjection;
pub use error::{IngestError, Result, SubscriptionError};
pub use pool::IngestionPool;
pub use processor::ProjectionProcessor;
pub use projection::{EventIngestor, ProjectionPosition};
pub use query::OrderQueries;
pub use store::{ProjectionStore, StoreSnapshot};
pub use subscription::{OrderSubscription, SubscriptionId, SubscriptionRegistry, SubscriptionState};
