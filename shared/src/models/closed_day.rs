//! Closed-day accounting record

use serde::{Deserialize, Serialize};

use super::Order;

/// Frozen end-of-day summary, keyed by (tenant, tenant-local date)
///
/// Created once by the day-close operation; immutable thereafter except
/// for administrative deletion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClosedDay {
    /// Tenant-local calendar date, `YYYY-MM-DD`
    pub date: String,
    pub tenant_id: String,
    pub total_revenue_cents: i64,
    pub total_orders: i64,
    pub total_items: i64,
    /// Frozen snapshot of every order created on this date
    pub snapshot: Vec<Order>,
    pub closed_at: i64,
}
