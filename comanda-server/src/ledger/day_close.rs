//! Whole-day close
//!
//! The only bulk state mutation in the system. Snapshot, aggregate, force
//! non-terminal orders to paid and persist the closed-day record all inside
//! one transaction: partial application (orders marked paid with no
//! snapshot persisted) is a correctness violation.
//!
//! Cancelled orders stay in the snapshot as an audit record but count
//! toward neither revenue nor order/item totals, so the stored aggregates
//! equal the snapshot sums over non-cancelled orders only.

use shared::models::{ClosedDay, ItemState, Order, OrderState};
use shared::util::now_millis;

use super::rows::{item_from_row, order_from_row};
use super::{LedgerError, LedgerResult, LedgerService};

impl LedgerService {
    /// Close out today's accounting for a tenant
    ///
    /// A day can be closed exactly once; re-closing fails with
    /// [`LedgerError::AlreadyClosed`] and leaves every order untouched.
    pub async fn close_day(&self, tenant_id: &str) -> LedgerResult<ClosedDay> {
        let date = self.business_date_today();
        let _guard = self.write_guard().await;
        let mut tx = self.pool().begin().await?;

        let already: Option<(String,)> =
            sqlx::query_as("SELECT date FROM closed_days WHERE tenant_id = ? AND date = ?")
                .bind(tenant_id)
                .bind(&date)
                .fetch_optional(&mut *tx)
                .await?;
        if already.is_some() {
            return Err(LedgerError::AlreadyClosed(date));
        }

        // 1. Snapshot every order created today
        let order_rows = sqlx::query(
            "SELECT * FROM orders WHERE tenant_id = ? AND business_date = ?
             ORDER BY ticket_number",
        )
        .bind(tenant_id)
        .bind(&date)
        .fetch_all(&mut *tx)
        .await?;

        let mut snapshot: Vec<Order> = Vec::with_capacity(order_rows.len());
        for row in &order_rows {
            let mut order = order_from_row(row)?;
            let item_rows =
                sqlx::query("SELECT * FROM order_items WHERE order_id = ? ORDER BY rowid")
                    .bind(&order.id)
                    .fetch_all(&mut *tx)
                    .await?;
            order.items = item_rows
                .iter()
                .map(item_from_row)
                .collect::<LedgerResult<_>>()?;
            snapshot.push(order);
        }

        // 2. Aggregates; cancelled orders count neither revenue nor volume
        let counted: Vec<&Order> = snapshot
            .iter()
            .filter(|o| o.state != OrderState::Cancelled)
            .collect();
        let total_revenue_cents: i64 = counted.iter().map(|o| o.total_cents).sum();
        let total_orders = counted.len() as i64;
        let total_items: i64 = counted
            .iter()
            .flat_map(|o| o.items.iter())
            .map(|i| i.quantity)
            .sum();

        // 3. Force every non-terminal order of the day into paid
        let now = now_millis();
        sqlx::query(
            "UPDATE orders SET state = 'paid', updated_at = ?, version = version + 1
             WHERE tenant_id = ? AND business_date = ?
               AND state NOT IN ('paid', 'cancelled')",
        )
        .bind(now)
        .bind(tenant_id)
        .bind(&date)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "UPDATE order_items SET state = 'delivered'
             WHERE order_id IN
                 (SELECT id FROM orders
                  WHERE tenant_id = ? AND business_date = ? AND state = 'paid')",
        )
        .bind(tenant_id)
        .bind(&date)
        .execute(&mut *tx)
        .await?;

        // The snapshot must carry the settled states the rows now hold;
        // the day:closed payload is what converged mirrors apply.
        for order in &mut snapshot {
            if !matches!(order.state, OrderState::Paid | OrderState::Cancelled) {
                order.state = OrderState::Paid;
                order.updated_at = now;
                order.version += 1;
            }
            if order.state == OrderState::Paid {
                for item in &mut order.items {
                    item.state = ItemState::Delivered;
                }
            }
        }

        // 4. Persist the closed-day record
        let closed = ClosedDay {
            date: date.clone(),
            tenant_id: tenant_id.to_string(),
            total_revenue_cents,
            total_orders,
            total_items,
            snapshot,
            closed_at: now,
        };
        sqlx::query(
            "INSERT INTO closed_days (tenant_id, date, total_revenue_cents, total_orders,
                                      total_items, snapshot, closed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(tenant_id)
        .bind(&date)
        .bind(total_revenue_cents)
        .bind(total_orders)
        .bind(total_items)
        .bind(serde_json::to_string(&closed.snapshot)?)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(tenant = tenant_id, %date, revenue = total_revenue_cents,
            orders = total_orders, "day closed");
        Ok(closed)
    }

    /// Closed-day record for a specific date, if any
    pub async fn get_closed_day(
        &self,
        tenant_id: &str,
        date: &str,
    ) -> LedgerResult<Option<ClosedDay>> {
        let row = sqlx::query("SELECT * FROM closed_days WHERE tenant_id = ? AND date = ?")
            .bind(tenant_id)
            .bind(date)
            .fetch_optional(self.pool())
            .await?;
        row.map(closed_day_from_row).transpose()
    }

    /// All closed days for a tenant, newest first
    pub async fn list_closed_days(&self, tenant_id: &str) -> LedgerResult<Vec<ClosedDay>> {
        let rows =
            sqlx::query("SELECT * FROM closed_days WHERE tenant_id = ? ORDER BY date DESC")
                .bind(tenant_id)
                .fetch_all(self.pool())
                .await?;
        rows.into_iter().map(closed_day_from_row).collect()
    }

    /// Administrative deletion of a closed-day record
    pub async fn delete_closed_day(&self, tenant_id: &str, date: &str) -> LedgerResult<bool> {
        let _guard = self.write_guard().await;
        let result = sqlx::query("DELETE FROM closed_days WHERE tenant_id = ? AND date = ?")
            .bind(tenant_id)
            .bind(date)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn closed_day_from_row(row: sqlx::sqlite::SqliteRow) -> LedgerResult<ClosedDay> {
    use sqlx::Row;
    let snapshot_json: String = row.get("snapshot");
    Ok(ClosedDay {
        date: row.get("date"),
        tenant_id: row.get("tenant_id"),
        total_revenue_cents: row.get("total_revenue_cents"),
        total_orders: row.get("total_orders"),
        total_items: row.get("total_items"),
        snapshot: serde_json::from_str(&snapshot_json)?,
        closed_at: row.get("closed_at"),
    })
}
