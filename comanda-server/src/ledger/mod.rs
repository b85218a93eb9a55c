//! Order Ledger
//!
//! The authoritative relational store of orders, line items, menu entries
//! and closed-day summaries. Owns every transactional invariant of the
//! system: daily ticket-number assignment, lifecycle transitions with the
//! delivered-cascade, and the atomic whole-day close.
//!
//! Every mutation runs inside one SQLite transaction and either fully
//! persists or not at all. Devices never generate ticket numbers; this
//! module is the sole writer.

mod batch;
mod day_close;
mod menu;
mod orders;
mod rows;

pub use batch::AppliedChange;
pub use orders::{NewOrder, NewOrderItem};

use std::sync::Arc;

use shared::models::InvalidTransition;
use sqlx::SqlitePool;
use thiserror::Error;

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("invalid item transition: {from:?} -> {to:?}")]
    InvalidItemTransition {
        from: shared::models::ItemState,
        to: shared::models::ItemState,
    },

    #[error("Day {0} is already closed")]
    AlreadyClosed(String),

    #[error("tenant mismatch: expected {expected}, got {got}")]
    TenantMismatch { expected: String, got: String },
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger service — all order/menu/day mutations go through here
///
/// SQLite allows a single writer at a time; the in-process write lock
/// serializes our write transactions so a read-then-insert window (ticket
/// allocation) never races another writer into a busy error. The unique
/// (tenant, business_date, ticket_number) index backstops the invariant.
#[derive(Clone)]
pub struct LedgerService {
    pool: SqlitePool,
    tz: chrono_tz::Tz,
    write_lock: Arc<tokio::sync::Mutex<()>>,
}

impl LedgerService {
    pub fn new(pool: SqlitePool, tz: chrono_tz::Tz) -> Self {
        Self {
            pool,
            tz,
            write_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Tenant-local calendar date of "now", `YYYY-MM-DD`
    ///
    /// Day boundaries are evaluated in the fixed tenant timezone, never in
    /// device-local time, so all devices agree on them.
    pub fn business_date_today(&self) -> String {
        chrono::Utc::now()
            .with_timezone(&self.tz)
            .date_naive()
            .to_string()
    }

    pub fn timezone(&self) -> chrono_tz::Tz {
        self.tz
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub(crate) async fn write_guard(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }
}
