//! Shared helpers for integration tests

use comanda_server::db::DbService;
use comanda_server::ledger::{LedgerService, NewOrder, NewOrderItem};

pub const TENANT: &str = "demo";

/// Ledger over a fresh in-memory database
pub async fn ledger() -> LedgerService {
    let db = DbService::new_in_memory().await.unwrap();
    LedgerService::new(db.pool.clone(), chrono_tz::Europe::Madrid)
}

pub fn espresso(quantity: i64) -> NewOrderItem {
    NewOrderItem {
        id: None,
        menu_entry_id: "menu-espresso".into(),
        name: "Espresso".into(),
        category: "drinks".into(),
        quantity,
        unit_price_cents: 150,
        instructions: None,
    }
}

pub fn tortilla(quantity: i64) -> NewOrderItem {
    NewOrderItem {
        id: None,
        menu_entry_id: "menu-tortilla".into(),
        name: "Tortilla".into(),
        category: "food".into(),
        quantity,
        unit_price_cents: 850,
        instructions: Some("no onion".into()),
    }
}

pub fn order(id: &str, items: Vec<NewOrderItem>) -> NewOrder {
    NewOrder {
        id: id.to_string(),
        tenant_id: TENANT.to_string(),
        waiter_id: "waiter-1".into(),
        table_label: Some("T1".into()),
        notes: None,
        items,
    }
}
