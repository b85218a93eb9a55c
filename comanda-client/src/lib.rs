//! Comanda Client - offline-first device library
//!
//! Everything a POS device needs to keep working through connectivity
//! loss: a durable local mirror of server state, a pending-operation
//! queue, the sync engine that drains it, and bootstrap reconciliation.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod http;
pub mod mirror;
pub mod queue;
pub mod sync;

pub use bootstrap::BootstrapSync;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use http::ApiClient;
pub use mirror::MirrorStore;
pub use queue::PendingQueue;
pub use sync::{DrainReport, SyncEngine};

// Re-export shared types devices work with
pub use shared::event::{ChangeEvent, ChangeEventKind};
pub use shared::models::{ClosedDay, ItemState, MenuEntry, Order, OrderItem, OrderState};
pub use shared::sync::{ItemPatch, MenuPatch, OrderPatch, PendingOperation};
