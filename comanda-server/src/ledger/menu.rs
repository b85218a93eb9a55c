//! Menu catalog access
//!
//! Admin mutations and the read path used by the bootstrap pull. The
//! order-creation flow never reads back through these rows — it works off
//! the snapshots captured in line items.

use shared::models::MenuEntry;
use shared::sync::MenuPatch;
use shared::util::now_millis;

use super::rows::menu_entry_from_row;
use super::{LedgerError, LedgerResult, LedgerService};

impl LedgerService {
    /// Insert or replace a menu entry by id
    pub async fn upsert_menu_entry(&self, entry: &MenuEntry) -> LedgerResult<MenuEntry> {
        if entry.id.is_empty() || entry.tenant_id.is_empty() {
            return Err(LedgerError::Validation(
                "menu entry requires id and tenant".into(),
            ));
        }
        let _guard = self.write_guard().await;
        sqlx::query(
            "INSERT INTO menu_entries (id, tenant_id, name, category, price_cents, available,
                                       description, image_url, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET
                 name = excluded.name,
                 category = excluded.category,
                 price_cents = excluded.price_cents,
                 available = excluded.available,
                 description = excluded.description,
                 image_url = excluded.image_url,
                 updated_at = excluded.updated_at",
        )
        .bind(&entry.id)
        .bind(&entry.tenant_id)
        .bind(&entry.name)
        .bind(&entry.category)
        .bind(entry.price_cents)
        .bind(entry.available)
        .bind(&entry.description)
        .bind(&entry.image_url)
        .bind(entry.updated_at)
        .execute(self.pool())
        .await?;
        self.get_menu_entry(&entry.id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(entry.id.clone()))
    }

    /// Apply a validated partial update to a menu entry
    pub async fn patch_menu_entry(&self, id: &str, patch: &MenuPatch) -> LedgerResult<MenuEntry> {
        let _guard = self.write_guard().await;
        let result = sqlx::query(
            "UPDATE menu_entries SET
                 name = COALESCE(?, name),
                 category = COALESCE(?, category),
                 price_cents = COALESCE(?, price_cents),
                 available = COALESCE(?, available),
                 description = COALESCE(?, description),
                 image_url = COALESCE(?, image_url),
                 updated_at = ?
             WHERE id = ?",
        )
        .bind(&patch.name)
        .bind(&patch.category)
        .bind(patch.price_cents)
        .bind(patch.available)
        .bind(&patch.description)
        .bind(&patch.image_url)
        .bind(now_millis())
        .bind(id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::NotFound(format!("Menu entry {id} not found")));
        }
        self.get_menu_entry(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))
    }

    pub async fn get_menu_entry(&self, id: &str) -> LedgerResult<Option<MenuEntry>> {
        let row = sqlx::query("SELECT * FROM menu_entries WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.as_ref().map(menu_entry_from_row))
    }

    /// Full tenant catalog (bootstrap pull reads this wholesale)
    pub async fn list_menu(&self, tenant_id: &str) -> LedgerResult<Vec<MenuEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM menu_entries WHERE tenant_id = ? ORDER BY category, name",
        )
        .bind(tenant_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.iter().map(menu_entry_from_row).collect())
    }

    /// Delete a menu entry; deleting an absent entry is a no-op
    pub async fn delete_menu_entry(&self, id: &str) -> LedgerResult<bool> {
        let _guard = self.write_guard().await;
        let result = sqlx::query("DELETE FROM menu_entries WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
