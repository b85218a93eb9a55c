//! Shared types for the Comanda POS sync core
//!
//! Common types used by both the server and the device client:
//! data models, the conflict resolver, change-event payloads,
//! pending-operation types and time helpers. This crate does no I/O.

pub mod conflict;
pub mod event;
pub mod models;
pub mod sync;
pub mod util;

// Re-exports
pub use conflict::{Timestamped, should_apply};
pub use event::{ChangeEvent, ChangeEventKind};
pub use models::{ClosedDay, ItemState, MenuEntry, Order, OrderItem, OrderState};
pub use sync::{BatchRequest, BatchResponse, EntityKind, OpKind, PendingOperation};
