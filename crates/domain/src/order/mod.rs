//! Order state, events and commands.

mod aggregate;
mod commands;
mod events;
mod state;

pub use aggregate::{Order, apply, replay};
pub use commands::OrderCommand;
pub use events::{OrderData, OrderEvent, ProductLineData};
pub use state::OrderStatus;
