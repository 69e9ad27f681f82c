//! Domain layer for the order read model.
//!
//! This crate provides:
//! - [`Order`] state and its [`OrderStatus`] lifecycle
//! - [`OrderEvent`], the facts consumed from the command side
//! - [`apply`], the pure event applier, and its typed [`ApplyError`]
//! - [`OrderCommand`], the intents the HTTP adapter translates into events

pub mod aggregate;
pub mod error;
pub mod order;

pub use aggregate::DomainEvent;
pub use error::{ApplyError, FailureKind};
pub use order::{
    Order, OrderCommand, OrderData, OrderEvent, OrderStatus, ProductLineData, apply, replay,
};
