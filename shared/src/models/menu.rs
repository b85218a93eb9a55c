//! Menu entry model

use serde::{Deserialize, Serialize};

/// Tenant-scoped catalog record
///
/// Mutated only by admin actions; the order-creation flow snapshots the
/// relevant fields into line items and never reads back through the entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MenuEntry {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub category: String,
    pub price_cents: i64,
    pub available: bool,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub updated_at: i64,
}

impl crate::conflict::Timestamped for MenuEntry {
    fn updated_at_millis(&self) -> i64 {
        self.updated_at
    }
}
