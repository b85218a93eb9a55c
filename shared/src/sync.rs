//! Pending-operation types and the batch sync wire format
//!
//! A `PendingOperation` is one self-contained, replayable mutation recorded
//! on the device before the server has confirmed it. The queue is an
//! append-only intent log: entries are deleted once acknowledged and never
//! otherwise mutated.

use serde::{Deserialize, Serialize};

use crate::models::{ItemState, OrderState};

/// Which table an operation targets
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Order,
    OrderItem,
    MenuEntry,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Order => "order",
            Self::OrderItem => "order_item",
            Self::MenuEntry => "menu_entry",
        }
    }
}

/// What the operation does
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Create,
    Update,
    Delete,
}

/// One queued mutation, self-contained and replayable
///
/// Replay tolerance is the server's job: `create` is upsert-safe and
/// `delete` of an already-deleted row is a no-op, so exactly-once *effect*
/// holds without exactly-once delivery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingOperation {
    pub id: String,
    pub tenant_id: String,
    pub entity: EntityKind,
    pub entity_id: String,
    pub op: OpKind,
    /// Structured description of the change; shape depends on (entity, op)
    pub payload: serde_json::Value,
    /// Device clock at enqueue time, used for last-write-wins comparison
    pub client_ts: i64,
    #[serde(default)]
    pub processed: bool,
    #[serde(default)]
    pub retries: u32,
}

impl crate::conflict::Timestamped for PendingOperation {
    fn updated_at_millis(&self) -> i64 {
        self.client_ts
    }
}

/// Request body of `POST /api/sync/batch`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub tenant_id: String,
    pub operations: Vec<PendingOperation>,
}

/// One rejected operation within a batch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchFailure {
    pub id: String,
    pub error: String,
}

/// Response body of `POST /api/sync/batch`
///
/// A batch may partially succeed: processed ids are safe to delete from
/// the device queue, failed ones stay queued for a later retry.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BatchResponse {
    pub processed: Vec<String>,
    pub failed: Vec<BatchFailure>,
}

// ========== Typed patches ==========
//
// Partial updates never reach the storage layer as a free-form column
// list. Each patch struct is the explicit allow-list for its entity;
// unknown fields fail deserialization outright.

/// Recognized top-level order fields for an update operation
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OrderPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<OrderState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_label: Option<String>,
}

impl OrderPatch {
    pub fn is_empty(&self) -> bool {
        self.state.is_none()
            && self.billing_info.is_none()
            && self.notes.is_none()
            && self.table_label.is_none()
    }
}

/// Single line-item update, keyed by (order id, item id)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ItemPatch {
    pub item_id: String,
    pub state: ItemState,
}

/// Recognized menu-entry fields for an update operation
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MenuPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_cents: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_rejects_unknown_fields() {
        let err = serde_json::from_str::<OrderPatch>(r#"{"state":"paid","total_cents":0}"#);
        assert!(err.is_err());
    }

    #[test]
    fn patch_accepts_allow_listed_fields() {
        let patch: OrderPatch =
            serde_json::from_str(r#"{"state":"delivered","billing_info":"CIF B-1234"}"#).unwrap();
        assert_eq!(patch.state, Some(OrderState::Delivered));
        assert_eq!(patch.billing_info.as_deref(), Some("CIF B-1234"));
        assert!(!patch.is_empty());
    }

    #[test]
    fn item_patch_roundtrip() {
        let patch = ItemPatch {
            item_id: "i1".into(),
            state: ItemState::Ready,
        };
        let json = serde_json::to_string(&patch).unwrap();
        let back: ItemPatch = serde_json::from_str(&json).unwrap();
        assert_eq!(back, patch);
    }
}
