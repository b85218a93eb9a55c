//! Order creation and lifecycle transitions
//!
//! # Ticket assignment
//!
//! `create_or_get_order` is the sole allocator of ticket numbers. Inside
//! one transaction it first looks the order id up — a retried request
//! reuses the existing ticket instead of allocating a second one — and
//! otherwise takes `1 + MAX(ticket_number)` over the same tenant and
//! tenant-local calendar day, starting at 1.

use serde::{Deserialize, Serialize};
use shared::models::{ItemState, Order, OrderItem, OrderState};
use shared::sync::OrderPatch;
use shared::util::now_millis;
use sqlx::Row;
use validator::Validate;

use super::rows::{item_from_row, order_from_row};
use super::{LedgerError, LedgerResult, LedgerService};

/// Inbound order for creation: device-generated id plus embedded items.
///
/// The ledger recomputes every item subtotal and the order totals from the
/// snapshotted unit prices; device-supplied money fields are not trusted.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewOrder {
    #[validate(length(min = 1))]
    pub id: String,
    #[validate(length(min = 1))]
    pub tenant_id: String,
    #[validate(length(min = 1))]
    pub waiter_id: String,
    pub table_label: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewOrderItem {
    /// Device-generated item id; one is minted if absent
    pub id: Option<String>,
    #[validate(length(min = 1))]
    pub menu_entry_id: String,
    #[validate(length(min = 1))]
    pub name: String,
    pub category: String,
    #[validate(range(min = 1))]
    pub quantity: i64,
    #[validate(range(min = 0))]
    pub unit_price_cents: i64,
    pub instructions: Option<String>,
}

impl From<Order> for NewOrder {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            tenant_id: order.tenant_id,
            waiter_id: order.waiter_id,
            table_label: order.table_label,
            notes: order.notes,
            items: order
                .items
                .into_iter()
                .map(|i| NewOrderItem {
                    id: Some(i.id),
                    menu_entry_id: i.menu_entry_id,
                    name: i.name,
                    category: i.category,
                    quantity: i.quantity,
                    unit_price_cents: i.unit_price_cents,
                    instructions: i.instructions,
                })
                .collect(),
        }
    }
}

impl LedgerService {
    /// Create an order with a fresh daily ticket number, or return the
    /// already-persisted one if this id was seen before (client retry).
    ///
    /// Returns the full order and whether it was newly created. On any
    /// error the transaction rolls back entirely; the caller's pending
    /// operation stays queued for retry.
    pub async fn create_or_get_order(&self, new: NewOrder) -> LedgerResult<(Order, bool)> {
        new.validate()
            .map_err(|e| LedgerError::Validation(e.to_string()))?;
        for item in &new.items {
            item.validate()
                .map_err(|e| LedgerError::Validation(e.to_string()))?;
        }

        let _guard = self.write_guard().await;
        let mut tx = self.pool().begin().await?;

        // Idempotency: a network timeout followed by a retry must not
        // allocate a second ticket.
        if let Some(existing) = load_order_tx(&mut tx, &new.id).await? {
            tx.commit().await?;
            tracing::debug!(order_id = %new.id, ticket = existing.ticket_number,
                "order already persisted, reusing ticket");
            return Ok((existing, false));
        }

        let business_date = self.business_date_today();
        let ticket_number: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(ticket_number), 0) + 1 FROM orders
             WHERE tenant_id = ? AND business_date = ?",
        )
        .bind(&new.tenant_id)
        .bind(&business_date)
        .fetch_one(&mut *tx)
        .await?;

        let now = now_millis();
        let items: Vec<OrderItem> = new
            .items
            .iter()
            .map(|i| OrderItem {
                id: i.id.clone().unwrap_or_else(shared::util::new_id),
                order_id: new.id.clone(),
                menu_entry_id: i.menu_entry_id.clone(),
                name: i.name.clone(),
                category: i.category.clone(),
                quantity: i.quantity,
                unit_price_cents: i.unit_price_cents,
                subtotal_cents: i.quantity * i.unit_price_cents,
                state: ItemState::Pending,
                instructions: i.instructions.clone(),
            })
            .collect();
        let subtotal: i64 = items.iter().map(|i| i.subtotal_cents).sum();

        sqlx::query(
            "INSERT INTO orders (id, tenant_id, waiter_id, ticket_number, business_date,
                                 table_label, state, subtotal_cents, total_cents, notes,
                                 billing_info, created_at, updated_at, version)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?, ?, 1)",
        )
        .bind(&new.id)
        .bind(&new.tenant_id)
        .bind(&new.waiter_id)
        .bind(ticket_number)
        .bind(&business_date)
        .bind(&new.table_label)
        .bind(OrderState::Pending.as_str())
        .bind(subtotal)
        .bind(subtotal)
        .bind(&new.notes)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        // Replace line items wholesale within the same transaction
        sqlx::query("DELETE FROM order_items WHERE order_id = ?")
            .bind(&new.id)
            .execute(&mut *tx)
            .await?;
        for item in &items {
            insert_item_tx(&mut tx, item).await?;
        }

        tx.commit().await?;
        tracing::info!(order_id = %new.id, ticket = ticket_number, date = %business_date,
            "order created");

        let mut order = self
            .load_order(&new.id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(new.id.clone()))?;
        order.synchronized = true;
        Ok((order, true))
    }

    /// Load an order with its items, or `None`
    pub async fn load_order(&self, order_id: &str) -> LedgerResult<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = ?")
            .bind(order_id)
            .fetch_optional(self.pool())
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut order = order_from_row(&row)?;
        order.items = self.load_items(order_id).await?;
        Ok(Some(order))
    }

    /// Load an order, failing with `NotFound`
    pub async fn get_order(&self, order_id: &str) -> LedgerResult<Order> {
        self.load_order(order_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Order {order_id} not found")))
    }

    async fn load_items(&self, order_id: &str) -> LedgerResult<Vec<OrderItem>> {
        let rows = sqlx::query("SELECT * FROM order_items WHERE order_id = ? ORDER BY rowid")
            .bind(order_id)
            .fetch_all(self.pool())
            .await?;
        rows.iter().map(item_from_row).collect()
    }

    /// All non-terminal orders of a tenant, items attached
    pub async fn list_active_orders(&self, tenant_id: &str) -> LedgerResult<Vec<Order>> {
        let rows = sqlx::query(
            "SELECT * FROM orders
             WHERE tenant_id = ? AND state NOT IN ('paid', 'cancelled')
             ORDER BY created_at",
        )
        .bind(tenant_id)
        .fetch_all(self.pool())
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut order = order_from_row(row)?;
            order.items = self.load_items(&order.id).await?;
            orders.push(order);
        }
        Ok(orders)
    }

    /// Apply a validated top-level patch to an order
    ///
    /// State changes go through the lifecycle table; reaching `delivered`
    /// or `paid` forces every line item into `delivered` within the same
    /// transaction.
    pub async fn update_order(&self, order_id: &str, patch: &OrderPatch) -> LedgerResult<Order> {
        if patch.is_empty() {
            return Err(LedgerError::Validation("empty patch".into()));
        }

        let _guard = self.write_guard().await;
        let mut tx = self.pool().begin().await?;

        let current = load_order_tx(&mut tx, order_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Order {order_id} not found")))?;

        let next_state = match patch.state {
            // Replayed update: already in the target state, nothing to move
            Some(target) if target == current.state => None,
            Some(target) => Some(current.state.transition_to(target)?),
            None => None,
        };

        let now = now_millis();
        sqlx::query(
            "UPDATE orders SET
                 state = COALESCE(?, state),
                 billing_info = COALESCE(?, billing_info),
                 notes = COALESCE(?, notes),
                 table_label = COALESCE(?, table_label),
                 updated_at = ?,
                 version = version + 1
             WHERE id = ?",
        )
        .bind(next_state.map(|s| s.as_str()))
        .bind(&patch.billing_info)
        .bind(&patch.notes)
        .bind(&patch.table_label)
        .bind(now)
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

        if matches!(next_state, Some(OrderState::Delivered) | Some(OrderState::Paid)) {
            sqlx::query("UPDATE order_items SET state = 'delivered' WHERE order_id = ?")
                .bind(order_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        self.get_order(order_id).await
    }

    /// Update a single line item's preparation state
    ///
    /// Narrow operation keyed by (order id, item id): sibling items and the
    /// parent order are untouched. Item states only move forward.
    pub async fn update_item_state(
        &self,
        order_id: &str,
        item_id: &str,
        state: ItemState,
    ) -> LedgerResult<Order> {
        let _guard = self.write_guard().await;
        let mut tx = self.pool().begin().await?;

        let row = sqlx::query("SELECT * FROM order_items WHERE id = ? AND order_id = ?")
            .bind(item_id)
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| {
                LedgerError::NotFound(format!("Item {item_id} not found on order {order_id}"))
            })?;
        let item = item_from_row(&row)?;

        if state == item.state {
            // Replay: already there
            tx.commit().await?;
            return self.get_order(order_id).await;
        }
        if !item.state.can_transition_to(state) {
            return Err(LedgerError::InvalidItemTransition {
                from: item.state,
                to: state,
            });
        }

        sqlx::query("UPDATE order_items SET state = ? WHERE id = ?")
            .bind(state.as_str())
            .bind(item_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE orders SET updated_at = ?, version = version + 1 WHERE id = ?")
            .bind(now_millis())
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        self.get_order(order_id).await
    }

    /// Which order a line item belongs to, if any
    pub async fn find_item_order(&self, item_id: &str) -> LedgerResult<Option<String>> {
        let row = sqlx::query("SELECT order_id FROM order_items WHERE id = ?")
            .bind(item_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(|r| r.get("order_id")))
    }

    /// Insert or replace a single line item, recomputing order totals
    ///
    /// Used by the batch path when an item was added to an existing order
    /// while offline. The parent order must exist.
    pub async fn upsert_item(&self, item: &OrderItem) -> LedgerResult<Order> {
        if item.quantity < 1 {
            return Err(LedgerError::Validation("item quantity must be >= 1".into()));
        }
        let _guard = self.write_guard().await;
        let mut tx = self.pool().begin().await?;

        let parent = load_order_tx(&mut tx, &item.order_id)
            .await?
            .ok_or_else(|| {
                LedgerError::NotFound(format!("Order {} not found", item.order_id))
            })?;
        if parent.state.is_terminal() {
            return Err(LedgerError::Validation(format!(
                "cannot add items to a {} order",
                parent.state.as_str()
            )));
        }

        let mut item = item.clone();
        item.subtotal_cents = item.quantity * item.unit_price_cents;
        sqlx::query("DELETE FROM order_items WHERE id = ?")
            .bind(&item.id)
            .execute(&mut *tx)
            .await?;
        insert_item_tx(&mut tx, &item).await?;
        recompute_totals_tx(&mut tx, &item.order_id).await?;

        tx.commit().await?;
        self.get_order(&item.order_id).await
    }

    /// Delete a single line item, recomputing order totals
    ///
    /// Returns the updated parent order, or `None` when the item was
    /// already gone (replay no-op).
    pub async fn delete_item(&self, item_id: &str) -> LedgerResult<Option<Order>> {
        let _guard = self.write_guard().await;
        let mut tx = self.pool().begin().await?;

        let order_id: Option<String> =
            sqlx::query("SELECT order_id FROM order_items WHERE id = ?")
                .bind(item_id)
                .fetch_optional(&mut *tx)
                .await?
                .map(|r| r.get("order_id"));
        let Some(order_id) = order_id else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM order_items WHERE id = ?")
            .bind(item_id)
            .execute(&mut *tx)
            .await?;
        recompute_totals_tx(&mut tx, &order_id).await?;

        tx.commit().await?;
        Ok(Some(self.get_order(&order_id).await?))
    }

    /// Delete an order and (by cascade) its items
    ///
    /// Deleting an already-absent order is a no-op, which keeps batch
    /// replays safe.
    pub async fn delete_order(&self, order_id: &str) -> LedgerResult<bool> {
        let _guard = self.write_guard().await;
        let result = sqlx::query("DELETE FROM orders WHERE id = ?")
            .bind(order_id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

async fn load_order_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    order_id: &str,
) -> LedgerResult<Option<Order>> {
    let row = sqlx::query("SELECT * FROM orders WHERE id = ?")
        .bind(order_id)
        .fetch_optional(&mut **tx)
        .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let mut order = order_from_row(&row)?;
    let item_rows = sqlx::query("SELECT * FROM order_items WHERE order_id = ? ORDER BY rowid")
        .bind(order_id)
        .fetch_all(&mut **tx)
        .await?;
    order.items = item_rows
        .iter()
        .map(item_from_row)
        .collect::<LedgerResult<_>>()?;
    Ok(Some(order))
}

async fn recompute_totals_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    order_id: &str,
) -> LedgerResult<()> {
    let subtotal: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(subtotal_cents), 0) FROM order_items WHERE order_id = ?",
    )
    .bind(order_id)
    .fetch_one(&mut **tx)
    .await?;
    sqlx::query(
        "UPDATE orders SET subtotal_cents = ?, total_cents = ?, updated_at = ?,
             version = version + 1
         WHERE id = ?",
    )
    .bind(subtotal)
    .bind(subtotal)
    .bind(now_millis())
    .bind(order_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_item_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    item: &OrderItem,
) -> LedgerResult<()> {
    sqlx::query(
        "INSERT INTO order_items (id, order_id, menu_entry_id, name, category, quantity,
                                  unit_price_cents, subtotal_cents, state, instructions)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&item.id)
    .bind(&item.order_id)
    .bind(&item.menu_entry_id)
    .bind(&item.name)
    .bind(&item.category)
    .bind(item.quantity)
    .bind(item.unit_price_cents)
    .bind(item.subtotal_cents)
    .bind(item.state.as_str())
    .bind(&item.instructions)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
