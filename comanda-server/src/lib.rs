//! Comanda Server - restaurant POS synchronization backend
//!
//! Always-on node that owns the authoritative order ledger for one venue
//! and fans committed changes out to every connected device.
//!
//! # Module structure
//!
//! ```text
//! comanda-server/src/
//! ├── core/       # configuration, state, server
//! ├── api/        # HTTP routes and handlers
//! ├── db/         # SQLite pool and migrations
//! ├── ledger/     # order ledger (the single writer)
//! ├── notifier/   # realtime change fan-out
//! └── utils/      # errors, logging
//! ```

pub mod api;
pub mod core;
pub mod db;
pub mod ledger;
pub mod notifier;
pub mod utils;

// Re-export public types
pub use core::{Config, Server, ServerState};
pub use ledger::{LedgerError, LedgerService, NewOrder};
pub use notifier::ChangeNotifier;
pub use utils::{AppError, AppResponse, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};
