//! Change-notification events
//!
//! Published by the server right after every ledger-mutating transaction
//! commits, and fanned out verbatim to all connected devices. Payloads
//! carry the same JSON shapes as the corresponding REST resources, so a
//! consumer can apply them directly into its mirror.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Named event kinds carried on the realtime channel
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChangeEventKind {
    #[serde(rename = "order:new")]
    OrderNew,
    #[serde(rename = "order:updated")]
    OrderUpdated,
    #[serde(rename = "order:item_updated")]
    OrderItemUpdated,
    #[serde(rename = "order:deleted")]
    OrderDeleted,
    #[serde(rename = "menu:updated")]
    MenuUpdated,
    #[serde(rename = "menu:deleted")]
    MenuDeleted,
    #[serde(rename = "day:closed")]
    DayClosed,
}

impl fmt::Display for ChangeEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::OrderNew => "order:new",
            Self::OrderUpdated => "order:updated",
            Self::OrderItemUpdated => "order:item_updated",
            Self::OrderDeleted => "order:deleted",
            Self::MenuUpdated => "menu:updated",
            Self::MenuDeleted => "menu:deleted",
            Self::DayClosed => "day:closed",
        };
        f.write_str(s)
    }
}

/// One committed change, as broadcast to every connected device
///
/// Delivery is fire-and-forget, at-most-once per currently-connected
/// client, with no replay buffer: a disconnected device misses the event
/// and heals via the bootstrap pull. `version` increments per event kind
/// so consumers can notice they fell behind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeEvent {
    pub tenant_id: String,
    pub event: ChangeEventKind,
    /// Id of the affected entity ("" for whole-day events)
    pub entity_id: String,
    /// Per-kind monotonic version (server-assigned)
    pub version: u64,
    /// REST-shaped resource data; `None` for deletions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}
