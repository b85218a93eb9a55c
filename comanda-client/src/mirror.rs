//! redb-based local mirror of server state
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `orders` | `order_id` | JSON `Order` | active + recent orders |
//! | `menu` | `entry_id` | JSON `MenuEntry` | menu catalog |
//! | `closed_days` | `date` | JSON `ClosedDay` | daily summaries |
//!
//! The mirror is what the UI reads and writes; it stays usable with the
//! server unreachable. Server state is authoritative: whatever arrives on
//! the change stream or a bootstrap pull overwrites the local copy.
//!
//! # Durability
//!
//! redb commits with `Durability::Immediate`, so an acknowledged write
//! survives power loss. Waiter handhelds get switched off mid-shift; the
//! mirror must come back in a consistent state.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use shared::event::{ChangeEvent, ChangeEventKind};
use shared::models::{ClosedDay, MenuEntry, Order};

use crate::error::ClientResult;

const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");
const MENU_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("menu");
const CLOSED_DAYS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("closed_days");

/// Local durable mirror backed by redb
#[derive(Clone)]
pub struct MirrorStore {
    db: Arc<Database>,
}

impl MirrorStore {
    /// Open or create the mirror at the given path
    pub fn open(path: impl AsRef<Path>) -> ClientResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory mirror (for tests)
    pub fn open_in_memory() -> ClientResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> ClientResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(MENU_TABLE)?;
            let _ = write_txn.open_table(CLOSED_DAYS_TABLE)?;
        }
        write_txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }

    // ========== Orders ==========

    pub fn upsert_order(&self, order: &Order) -> ClientResult<()> {
        let bytes = serde_json::to_vec(order)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(ORDERS_TABLE)?;
            table.insert(order.id.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_order(&self, id: &str) -> ClientResult<Option<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;
        match table.get(id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    pub fn delete_order(&self, id: &str) -> ClientResult<bool> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(ORDERS_TABLE)?;
            table.remove(id)?.is_some()
        };
        write_txn.commit()?;
        Ok(existed)
    }

    pub fn list_orders(&self) -> ClientResult<Vec<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;
        let mut orders = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            orders.push(serde_json::from_slice(value.value())?);
        }
        Ok(orders)
    }

    /// Active orders as the UI lists them, oldest ticket first
    pub fn list_active_orders(&self) -> ClientResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .list_orders()?
            .into_iter()
            .filter(|o| !o.state.is_terminal())
            .collect();
        orders.sort_by_key(|o| o.ticket_number);
        Ok(orders)
    }

    // ========== Menu ==========

    pub fn upsert_menu_entry(&self, entry: &MenuEntry) -> ClientResult<()> {
        let bytes = serde_json::to_vec(entry)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(MENU_TABLE)?;
            table.insert(entry.id.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_menu_entry(&self, id: &str) -> ClientResult<Option<MenuEntry>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(MENU_TABLE)?;
        match table.get(id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    pub fn delete_menu_entry(&self, id: &str) -> ClientResult<bool> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(MENU_TABLE)?;
            table.remove(id)?.is_some()
        };
        write_txn.commit()?;
        Ok(existed)
    }

    pub fn list_menu(&self) -> ClientResult<Vec<MenuEntry>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(MENU_TABLE)?;
        let mut entries = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            entries.push(serde_json::from_slice(value.value())?);
        }
        Ok(entries)
    }

    /// Replace the whole catalog with the server's copy (bootstrap pull)
    pub fn replace_menu(&self, entries: &[MenuEntry]) -> ClientResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(MENU_TABLE)?;
            table.retain(|_, _| false)?;
            for entry in entries {
                let bytes = serde_json::to_vec(entry)?;
                table.insert(entry.id.as_str(), bytes.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    // ========== Closed days ==========

    pub fn upsert_closed_day(&self, day: &ClosedDay) -> ClientResult<()> {
        let bytes = serde_json::to_vec(day)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CLOSED_DAYS_TABLE)?;
            table.insert(day.date.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn list_closed_days(&self) -> ClientResult<Vec<ClosedDay>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CLOSED_DAYS_TABLE)?;
        let mut days = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            days.push(serde_json::from_slice(value.value())?);
        }
        Ok(days)
    }

    // ========== Change stream ==========

    /// Apply one event from the realtime channel
    ///
    /// Server data is authoritative and overwrites the local copy
    /// unconditionally.
    pub fn apply_change(&self, event: &ChangeEvent) -> ClientResult<()> {
        match event.event {
            ChangeEventKind::OrderNew
            | ChangeEventKind::OrderUpdated
            | ChangeEventKind::OrderItemUpdated => {
                if let Some(data) = &event.data {
                    let order: Order = serde_json::from_value(data.clone())?;
                    self.upsert_order(&order)?;
                }
            }
            ChangeEventKind::OrderDeleted => {
                self.delete_order(&event.entity_id)?;
            }
            ChangeEventKind::MenuUpdated => {
                if let Some(data) = &event.data {
                    let entry: MenuEntry = serde_json::from_value(data.clone())?;
                    self.upsert_menu_entry(&entry)?;
                }
            }
            ChangeEventKind::MenuDeleted => {
                self.delete_menu_entry(&event.entity_id)?;
            }
            ChangeEventKind::DayClosed => {
                if let Some(data) = &event.data {
                    let day: ClosedDay = serde_json::from_value(data.clone())?;
                    // The snapshot carries final order states (force-settled)
                    for order in &day.snapshot {
                        self.upsert_order(order)?;
                    }
                    self.upsert_closed_day(&day)?;
                }
            }
        }
        Ok(())
    }

    /// Reconcile mirrored orders against a server pull
    ///
    /// Server orders overwrite local copies. Local orders that the server
    /// does not know about are kept only while unsynchronized (still queued
    /// for upload); synchronized ones absent from the pull are stale and
    /// are dropped.
    pub fn reconcile_orders(&self, server_orders: &[Order]) -> ClientResult<()> {
        for order in server_orders {
            self.upsert_order(order)?;
        }

        let known: std::collections::HashSet<&str> =
            server_orders.iter().map(|o| o.id.as_str()).collect();
        for order in self.list_orders()? {
            if order.synchronized && !order.state.is_terminal() && !known.contains(order.id.as_str())
            {
                self.delete_order(&order.id)?;
            }
        }
        Ok(())
    }
}
