//! Order model
//!
//! An order owns its line items exclusively; items are cascade-deleted with
//! the order. All money is integer cents, all timestamps epoch millis.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Order lifecycle state
///
/// ```text
/// pending → in_progress → ready → delivered → paid
///                │                              ▲
///                └──────── cancelled ◄──────────┘ (any non-terminal)
/// ```
///
/// `Paid` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    #[default]
    Pending,
    InProgress,
    Ready,
    Delivered,
    Paid,
    Cancelled,
}

/// Rejected lifecycle transition
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid transition: {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: OrderState,
    pub to: OrderState,
}

impl OrderState {
    /// Whether this state accepts no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Cancelled)
    }

    /// Check the lifecycle transition table
    ///
    /// Forward-only along the service chain; `Cancelled` is reachable from
    /// any non-terminal state.
    pub fn can_transition_to(&self, next: OrderState) -> bool {
        use OrderState::*;
        if *self == next {
            return false;
        }
        match (*self, next) {
            (_, Cancelled) => !self.is_terminal(),
            (Pending, InProgress | Ready | Delivered | Paid) => true,
            (InProgress, Ready | Delivered | Paid) => true,
            (Ready, Delivered | Paid) => true,
            (Delivered, Paid) => true,
            _ => false,
        }
    }

    /// Validate a transition, yielding a structured error on rejection
    pub fn transition_to(&self, next: OrderState) -> Result<OrderState, InvalidTransition> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(InvalidTransition {
                from: *self,
                to: next,
            })
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Ready => "ready",
            Self::Delivered => "delivered",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "ready" => Some(Self::Ready),
            "delivered" => Some(Self::Delivered),
            "paid" => Some(Self::Paid),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Per-item preparation state (monotonic, no regressing from delivered)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    #[default]
    Pending,
    InProgress,
    Ready,
    Delivered,
}

impl ItemState {
    /// Item states only move forward
    pub fn can_transition_to(&self, next: ItemState) -> bool {
        next > *self
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Ready => "ready",
            Self::Delivered => "delivered",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "ready" => Some(Self::Ready),
            "delivered" => Some(Self::Delivered),
            _ => None,
        }
    }
}

/// Order line item
///
/// Name, category and unit price are snapshots captured when the item is
/// added, immune to later menu edits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub menu_entry_id: String,
    pub name: String,
    pub category: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// quantity × unit price at time of addition
    pub subtotal_cents: i64,
    pub state: ItemState,
    pub instructions: Option<String>,
}

impl OrderItem {
    /// Snapshot a menu entry into a line item
    pub fn from_menu_entry(
        order_id: &str,
        entry: &super::MenuEntry,
        quantity: i64,
        instructions: Option<String>,
    ) -> Self {
        Self {
            id: crate::util::new_id(),
            order_id: order_id.to_string(),
            menu_entry_id: entry.id.clone(),
            name: entry.name.clone(),
            category: entry.category.clone(),
            quantity,
            unit_price_cents: entry.price_cents,
            subtotal_cents: quantity * entry.price_cents,
            state: ItemState::Pending,
            instructions,
        }
    }
}

/// Order entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    /// Opaque unique id, generated on the device, stable across retries
    pub id: String,
    pub tenant_id: String,
    pub waiter_id: String,
    /// Human-facing sequential daily number, assigned solely by the ledger
    pub ticket_number: i64,
    pub table_label: Option<String>,
    pub state: OrderState,
    pub subtotal_cents: i64,
    pub total_cents: i64,
    pub notes: Option<String>,
    pub billing_info: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    /// Monotonic version counter, bumped on every ledger write
    pub version: i64,
    /// Device-only flag: true once the ledger has confirmed this order.
    /// Never stored by the server.
    #[serde(default)]
    pub synchronized: bool,
    pub items: Vec<OrderItem>,
}

impl crate::conflict::Timestamped for Order {
    fn updated_at_millis(&self) -> i64 {
        self.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_state_forward_chain() {
        use OrderState::*;
        assert!(Pending.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Ready));
        assert!(Ready.can_transition_to(Delivered));
        assert!(Delivered.can_transition_to(Paid));
        // skipping ahead is allowed
        assert!(Pending.can_transition_to(Paid));
    }

    #[test]
    fn order_state_no_regression() {
        use OrderState::*;
        assert!(!Ready.can_transition_to(Pending));
        assert!(!Delivered.can_transition_to(InProgress));
        assert!(!Paid.can_transition_to(Delivered));
    }

    #[test]
    fn cancel_from_non_terminal_only() {
        use OrderState::*;
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Ready.can_transition_to(Cancelled));
        assert!(!Paid.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
    }

    #[test]
    fn item_state_monotonic() {
        use ItemState::*;
        assert!(Pending.can_transition_to(Delivered));
        assert!(InProgress.can_transition_to(Ready));
        assert!(!Delivered.can_transition_to(Ready));
        assert!(!Ready.can_transition_to(Ready));
    }

    #[test]
    fn item_snapshot_computes_subtotal() {
        let entry = crate::models::MenuEntry {
            id: "m1".into(),
            tenant_id: "demo".into(),
            name: "Paella".into(),
            category: "mains".into(),
            price_cents: 1250,
            available: true,
            description: None,
            image_url: None,
            updated_at: 0,
        };
        let item = OrderItem::from_menu_entry("o1", &entry, 3, None);
        assert_eq!(item.subtotal_cents, 3750);
        assert_eq!(item.name, "Paella");
        assert_eq!(item.state, ItemState::Pending);
    }
}
