//! Database Module
//!
//! Handles the SQLite connection pool and migrations. The pool is the
//! ledger's only storage handle; every ledger mutation runs inside one of
//! its transactions.

pub mod service;

pub use service::DbService;
