//! Data models shared between the ledger and the device mirror

mod closed_day;
mod menu;
mod order;

pub use closed_day::ClosedDay;
pub use menu::MenuEntry;
pub use order::{InvalidTransition, ItemState, Order, OrderItem, OrderState};
