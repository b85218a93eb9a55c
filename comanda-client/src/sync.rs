//! Offline-first sync engine
//!
//! Every local mutation follows the same path regardless of connectivity:
//!
//! ```text
//! UI action ──► queue.enqueue (durable) ──► mirror (optimistic) ──► drain?
//! ```
//!
//! The enqueue commit is the durability point; once it returns, the
//! operation survives restarts and will eventually reach the server. The
//! mirror write keeps the UI responsive, and the drain runs only when the
//! device believes it is online.
//!
//! Drains are single-flight: a `try_lock` on the drain mutex makes a
//! second trigger (connectivity flap, foreground event) a no-op while one
//! is running, so the server never sees the same queue twice in parallel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use shared::models::{MenuEntry, Order};
use shared::sync::{
    BatchRequest, EntityKind, ItemPatch, MenuPatch, OpKind, OrderPatch, PendingOperation,
};
use shared::util::{new_id, now_millis};

use crate::error::{ClientError, ClientResult};
use crate::http::ApiClient;
use crate::mirror::MirrorStore;
use crate::queue::PendingQueue;

/// Outcome of one drain pass
#[derive(Debug, Default, Clone, Copy)]
pub struct DrainReport {
    pub sent: usize,
    pub acked: usize,
    pub failed: usize,
}

/// Coordinates queue, mirror and network
#[derive(Clone)]
pub struct SyncEngine {
    api: ApiClient,
    queue: PendingQueue,
    mirror: MirrorStore,
    max_retries: u32,
    online: Arc<AtomicBool>,
    drain_lock: Arc<tokio::sync::Mutex<()>>,
}

impl SyncEngine {
    pub fn new(api: ApiClient, queue: PendingQueue, mirror: MirrorStore, max_retries: u32) -> Self {
        Self {
            api,
            queue,
            mirror,
            max_retries,
            online: Arc::new(AtomicBool::new(false)),
            drain_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn mirror(&self) -> &MirrorStore {
        &self.mirror
    }

    pub fn queue(&self) -> &PendingQueue {
        &self.queue
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Record a connectivity change; going online triggers a drain
    pub async fn set_online(&self, online: bool) -> ClientResult<DrainReport> {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        if online && !was_online {
            tracing::info!("connectivity restored, draining queue");
            return self.drain().await;
        }
        Ok(DrainReport::default())
    }

    /// App came to the foreground; retry whatever is still queued
    pub async fn on_foreground(&self) -> ClientResult<DrainReport> {
        if self.is_online() {
            self.drain().await
        } else {
            Ok(DrainReport::default())
        }
    }

    // ========== Local mutations ==========

    /// Queue an order creation and mirror it optimistically
    pub async fn create_order(&self, order: &Order) -> ClientResult<()> {
        let mut local = order.clone();
        local.synchronized = false;

        self.submit(
            EntityKind::Order,
            &local.id.clone(),
            OpKind::Create,
            serde_json::to_value(&local)?,
        )
        .await?;
        Ok(())
    }

    /// Queue an order patch (state, billing info, notes, table)
    pub async fn update_order(&self, order_id: &str, patch: &OrderPatch) -> ClientResult<()> {
        self.submit(
            EntityKind::Order,
            order_id,
            OpKind::Update,
            serde_json::to_value(patch)?,
        )
        .await
    }

    /// Queue a line-item state change
    pub async fn update_item(&self, item_id: &str, patch: &ItemPatch) -> ClientResult<()> {
        self.submit(
            EntityKind::OrderItem,
            item_id,
            OpKind::Update,
            serde_json::to_value(patch)?,
        )
        .await
    }

    /// Queue an order deletion (draft abandonment)
    pub async fn delete_order(&self, order_id: &str) -> ClientResult<()> {
        self.submit(
            EntityKind::Order,
            order_id,
            OpKind::Delete,
            serde_json::Value::Null,
        )
        .await
    }

    /// Queue a menu upsert
    pub async fn upsert_menu_entry(&self, entry: &MenuEntry) -> ClientResult<()> {
        self.submit(
            EntityKind::MenuEntry,
            &entry.id.clone(),
            OpKind::Create,
            serde_json::to_value(entry)?,
        )
        .await
    }

    /// Queue a menu patch
    pub async fn update_menu_entry(&self, entry_id: &str, patch: &MenuPatch) -> ClientResult<()> {
        self.submit(
            EntityKind::MenuEntry,
            entry_id,
            OpKind::Update,
            serde_json::to_value(patch)?,
        )
        .await
    }

    /// Queue a menu deletion
    pub async fn delete_menu_entry(&self, entry_id: &str) -> ClientResult<()> {
        self.submit(
            EntityKind::MenuEntry,
            entry_id,
            OpKind::Delete,
            serde_json::Value::Null,
        )
        .await
    }

    async fn submit(
        &self,
        entity: EntityKind,
        entity_id: &str,
        op: OpKind,
        payload: serde_json::Value,
    ) -> ClientResult<()> {
        let operation = PendingOperation {
            id: new_id(),
            tenant_id: self.api.tenant_id().to_string(),
            entity,
            entity_id: entity_id.to_string(),
            op,
            payload,
            client_ts: now_millis(),
            processed: false,
            retries: 0,
        };

        // Durability point: after this commit the op cannot be lost
        self.queue.enqueue(&operation)?;
        self.apply_local(&operation)?;

        if self.is_online() {
            if let Err(e) = self.drain().await {
                // Queued and mirrored; the next drain retries the push
                tracing::warn!("drain after submit failed: {e}");
            }
        }
        Ok(())
    }

    /// Optimistic mirror application of a queued operation
    fn apply_local(&self, op: &PendingOperation) -> ClientResult<()> {
        match (op.entity, op.op) {
            (EntityKind::Order, OpKind::Create) => {
                let order: Order = serde_json::from_value(op.payload.clone())?;
                self.mirror.upsert_order(&order)?;
            }
            (EntityKind::Order, OpKind::Update) => {
                let patch: OrderPatch = serde_json::from_value(op.payload.clone())?;
                if let Some(mut order) = self.mirror.get_order(&op.entity_id)? {
                    if let Some(state) = patch.state {
                        order.state = state;
                    }
                    if let Some(billing) = patch.billing_info {
                        order.billing_info = Some(billing);
                    }
                    if let Some(notes) = patch.notes {
                        order.notes = Some(notes);
                    }
                    if let Some(table) = patch.table_label {
                        order.table_label = Some(table);
                    }
                    order.updated_at = op.client_ts;
                    self.mirror.upsert_order(&order)?;
                }
            }
            (EntityKind::Order, OpKind::Delete) => {
                self.mirror.delete_order(&op.entity_id)?;
            }
            (EntityKind::OrderItem, OpKind::Update) => {
                let patch: ItemPatch = serde_json::from_value(op.payload.clone())?;
                // entity_id is the item id; find its order in the mirror
                for mut order in self.mirror.list_orders()? {
                    let Some(item) = order.items.iter_mut().find(|i| i.id == patch.item_id)
                    else {
                        continue;
                    };
                    item.state = patch.state;
                    order.updated_at = op.client_ts;
                    self.mirror.upsert_order(&order)?;
                    break;
                }
            }
            (EntityKind::OrderItem, _) => {}
            (EntityKind::MenuEntry, OpKind::Create) => {
                let entry: MenuEntry = serde_json::from_value(op.payload.clone())?;
                self.mirror.upsert_menu_entry(&entry)?;
            }
            (EntityKind::MenuEntry, OpKind::Update) => {
                let patch: MenuPatch = serde_json::from_value(op.payload.clone())?;
                if let Some(mut entry) = self.mirror.get_menu_entry(&op.entity_id)? {
                    if let Some(name) = patch.name {
                        entry.name = name;
                    }
                    if let Some(category) = patch.category {
                        entry.category = category;
                    }
                    if let Some(price) = patch.price_cents {
                        entry.price_cents = price;
                    }
                    if let Some(available) = patch.available {
                        entry.available = available;
                    }
                    if let Some(description) = patch.description {
                        entry.description = Some(description);
                    }
                    if let Some(image_url) = patch.image_url {
                        entry.image_url = Some(image_url);
                    }
                    entry.updated_at = op.client_ts;
                    self.mirror.upsert_menu_entry(&entry)?;
                }
            }
            (EntityKind::MenuEntry, OpKind::Delete) => {
                self.mirror.delete_menu_entry(&op.entity_id)?;
            }
        }
        Ok(())
    }

    // ========== Drain ==========

    /// Push the queue to the server, oldest first
    ///
    /// Single-flight; a concurrent call returns immediately with an empty
    /// report. A transport failure flips the engine offline and bumps the
    /// retry counter of every operation in the attempted batch.
    pub async fn drain(&self) -> ClientResult<DrainReport> {
        let Ok(_guard) = self.drain_lock.try_lock() else {
            return Ok(DrainReport::default());
        };

        let pending = self.queue.unprocessed(self.max_retries)?;
        if pending.is_empty() {
            return Ok(DrainReport::default());
        }

        let batch = BatchRequest {
            tenant_id: self.api.tenant_id().to_string(),
            operations: pending.iter().map(|(_, op)| op.clone()).collect(),
        };

        let response = match self.api.submit_batch(&batch).await {
            Ok(response) => response,
            Err(ClientError::Http(e)) => {
                tracing::warn!("batch push failed, going offline: {e}");
                self.online.store(false, Ordering::SeqCst);
                let attempted: Vec<u64> = pending.iter().map(|(seq, _)| *seq).collect();
                self.queue.bump_retry(&attempted)?;
                return Err(ClientError::Http(e));
            }
            Err(e) => return Err(e),
        };

        let mut acked_seqs = Vec::new();
        let mut failed_seqs = Vec::new();
        for (seq, op) in &pending {
            if response.processed.contains(&op.id) {
                acked_seqs.push(*seq);
            } else {
                failed_seqs.push(*seq);
            }
        }
        if let Some(failure) = response.failed.first() {
            tracing::warn!(
                failed = response.failed.len(),
                first_id = %failure.id,
                first_error = %failure.error,
                "server rejected operations"
            );
        }

        self.queue.ack(&acked_seqs)?;
        self.queue.bump_retry(&failed_seqs)?;

        // Acked creates are now server-known
        for (seq, op) in &pending {
            if !acked_seqs.contains(seq) {
                continue;
            }
            if op.entity == EntityKind::Order && op.op == OpKind::Create {
                if let Some(mut order) = self.mirror.get_order(&op.entity_id)? {
                    order.synchronized = true;
                    self.mirror.upsert_order(&order)?;
                }
            }
        }

        let report = DrainReport {
            sent: pending.len(),
            acked: acked_seqs.len(),
            failed: failed_seqs.len(),
        };
        tracing::info!(
            sent = report.sent,
            acked = report.acked,
            failed = report.failed,
            "queue drained"
        );
        Ok(report)
    }
}
