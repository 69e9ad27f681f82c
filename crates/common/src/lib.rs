//! Identifier types shared across the order read model.

pub mod types;

pub use types::{OrderId, ProductId};
