//! Row-to-model mapping helpers

use shared::models::{ItemState, MenuEntry, Order, OrderItem, OrderState};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::{LedgerError, LedgerResult};

pub(crate) fn order_from_row(row: &SqliteRow) -> LedgerResult<Order> {
    let state_str: String = row.get("state");
    let state = OrderState::parse(&state_str)
        .ok_or_else(|| LedgerError::Validation(format!("unknown order state: {state_str}")))?;

    Ok(Order {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        waiter_id: row.get("waiter_id"),
        ticket_number: row.get("ticket_number"),
        table_label: row.get("table_label"),
        state,
        subtotal_cents: row.get("subtotal_cents"),
        total_cents: row.get("total_cents"),
        notes: row.get("notes"),
        billing_info: row.get("billing_info"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        version: row.get("version"),
        // The ledger is the source of truth; anything read from it is
        // synchronized by definition.
        synchronized: true,
        items: Vec::new(),
    })
}

pub(crate) fn item_from_row(row: &SqliteRow) -> LedgerResult<OrderItem> {
    let state_str: String = row.get("state");
    let state = ItemState::parse(&state_str)
        .ok_or_else(|| LedgerError::Validation(format!("unknown item state: {state_str}")))?;

    Ok(OrderItem {
        id: row.get("id"),
        order_id: row.get("order_id"),
        menu_entry_id: row.get("menu_entry_id"),
        name: row.get("name"),
        category: row.get("category"),
        quantity: row.get("quantity"),
        unit_price_cents: row.get("unit_price_cents"),
        subtotal_cents: row.get("subtotal_cents"),
        state,
        instructions: row.get("instructions"),
    })
}

pub(crate) fn menu_entry_from_row(row: &SqliteRow) -> MenuEntry {
    MenuEntry {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        name: row.get("name"),
        category: row.get("category"),
        price_cents: row.get("price_cents"),
        available: row.get("available"),
        description: row.get("description"),
        image_url: row.get("image_url"),
        updated_at: row.get("updated_at"),
    }
}
