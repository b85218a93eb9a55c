//! Batch application of device-queued operations
//!
//! Each operation applies independently in its own transaction: a bad
//! operation fails alone and never aborts its siblings. Replays are
//! tolerated throughout (`create` is upsert-safe, `delete` of a missing
//! row is a no-op), so the device achieves exactly-once effect without
//! exactly-once delivery. Updates go through the last-write-wins resolver;
//! a superseded update counts as processed — the decision to discard it
//! *is* its outcome, and retrying would not change it.
//!
//! For `OrderItem` operations the operation's `entity_id` is the item id;
//! create payloads carry the parent order id inside the item itself.

use shared::conflict::should_apply;
use shared::event::ChangeEventKind;
use shared::models::{MenuEntry, Order, OrderItem};
use shared::sync::{
    BatchFailure, BatchRequest, BatchResponse, EntityKind, ItemPatch, MenuPatch, OpKind,
    OrderPatch, PendingOperation,
};

use super::{LedgerError, LedgerResult, LedgerService};

/// One committed effect of a batch, ready to be published
#[derive(Debug, Clone)]
pub struct AppliedChange {
    pub kind: ChangeEventKind,
    pub entity_id: String,
    pub data: Option<serde_json::Value>,
}

impl AppliedChange {
    fn with_data<T: serde::Serialize>(
        kind: ChangeEventKind,
        entity_id: &str,
        data: &T,
    ) -> LedgerResult<Self> {
        Ok(Self {
            kind,
            entity_id: entity_id.to_string(),
            data: Some(serde_json::to_value(data)?),
        })
    }

    fn deletion(kind: ChangeEventKind, entity_id: &str) -> Self {
        Self {
            kind,
            entity_id: entity_id.to_string(),
            data: None,
        }
    }
}

impl LedgerService {
    /// Apply a device batch, reporting per-operation outcomes
    ///
    /// Returns the processed/failed split for the device queue plus the
    /// list of committed changes the caller must publish.
    pub async fn apply_batch(
        &self,
        req: &BatchRequest,
    ) -> LedgerResult<(BatchResponse, Vec<AppliedChange>)> {
        let mut response = BatchResponse::default();
        let mut changes = Vec::new();

        for op in &req.operations {
            if op.tenant_id != req.tenant_id {
                let err = LedgerError::TenantMismatch {
                    expected: req.tenant_id.clone(),
                    got: op.tenant_id.clone(),
                };
                tracing::warn!(op_id = %op.id, "rejected batch operation: {err}");
                response.failed.push(BatchFailure {
                    id: op.id.clone(),
                    error: err.to_string(),
                });
                continue;
            }

            match self.apply_operation(op).await {
                Ok(change) => {
                    response.processed.push(op.id.clone());
                    if let Some(change) = change {
                        changes.push(change);
                    }
                }
                Err(e) => {
                    tracing::warn!(op_id = %op.id, entity = ?op.entity, op = ?op.op,
                        "batch operation failed: {e}");
                    response.failed.push(BatchFailure {
                        id: op.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok((response, changes))
    }

    /// Apply one operation; `Ok(None)` means applied with nothing to publish
    /// (replayed create, superseded update, delete of a missing row).
    async fn apply_operation(
        &self,
        op: &PendingOperation,
    ) -> LedgerResult<Option<AppliedChange>> {
        match (op.entity, op.op) {
            (EntityKind::Order, OpKind::Create) => {
                let order: Order = serde_json::from_value(op.payload.clone())?;
                let (order, created) = self.create_or_get_order(order.into()).await?;
                if created {
                    Ok(Some(AppliedChange::with_data(
                        ChangeEventKind::OrderNew,
                        &order.id,
                        &order,
                    )?))
                } else {
                    Ok(None)
                }
            }
            (EntityKind::Order, OpKind::Update) => {
                let patch: OrderPatch = serde_json::from_value(op.payload.clone())?;
                let existing = self.get_order(&op.entity_id).await?;
                if !should_apply(Some(&existing), op) {
                    tracing::debug!(op_id = %op.id, order_id = %op.entity_id,
                        "update superseded by newer write, discarding");
                    return Ok(None);
                }
                let order = self.update_order(&op.entity_id, &patch).await?;
                Ok(Some(AppliedChange::with_data(
                    ChangeEventKind::OrderUpdated,
                    &order.id,
                    &order,
                )?))
            }
            (EntityKind::Order, OpKind::Delete) => {
                let deleted = self.delete_order(&op.entity_id).await?;
                Ok(deleted
                    .then(|| AppliedChange::deletion(ChangeEventKind::OrderDeleted, &op.entity_id)))
            }
            (EntityKind::OrderItem, OpKind::Create) => {
                let item: OrderItem = serde_json::from_value(op.payload.clone())?;
                let order = self.upsert_item(&item).await?;
                Ok(Some(AppliedChange::with_data(
                    ChangeEventKind::OrderUpdated,
                    &order.id,
                    &order,
                )?))
            }
            (EntityKind::OrderItem, OpKind::Update) => {
                let patch: ItemPatch = serde_json::from_value(op.payload.clone())?;
                let order_id = self
                    .find_item_order(&patch.item_id)
                    .await?
                    .ok_or_else(|| {
                        LedgerError::NotFound(format!("Item {} not found", patch.item_id))
                    })?;
                let order = self
                    .update_item_state(&order_id, &patch.item_id, patch.state)
                    .await?;
                Ok(Some(AppliedChange::with_data(
                    ChangeEventKind::OrderItemUpdated,
                    &order.id,
                    &order,
                )?))
            }
            (EntityKind::OrderItem, OpKind::Delete) => {
                let parent = self.delete_item(&op.entity_id).await?;
                match parent {
                    Some(order) => Ok(Some(AppliedChange::with_data(
                        ChangeEventKind::OrderUpdated,
                        &order.id,
                        &order,
                    )?)),
                    None => Ok(None),
                }
            }
            (EntityKind::MenuEntry, OpKind::Create) => {
                let entry: MenuEntry = serde_json::from_value(op.payload.clone())?;
                let existing = self.get_menu_entry(&entry.id).await?;
                if !should_apply(existing.as_ref(), op) {
                    return Ok(None);
                }
                let entry = self.upsert_menu_entry(&entry).await?;
                Ok(Some(AppliedChange::with_data(
                    ChangeEventKind::MenuUpdated,
                    &entry.id,
                    &entry,
                )?))
            }
            (EntityKind::MenuEntry, OpKind::Update) => {
                let patch: MenuPatch = serde_json::from_value(op.payload.clone())?;
                let existing = self.get_menu_entry(&op.entity_id).await?.ok_or_else(|| {
                    LedgerError::NotFound(format!("Menu entry {} not found", op.entity_id))
                })?;
                if !should_apply(Some(&existing), op) {
                    return Ok(None);
                }
                let entry = self.patch_menu_entry(&op.entity_id, &patch).await?;
                Ok(Some(AppliedChange::with_data(
                    ChangeEventKind::MenuUpdated,
                    &entry.id,
                    &entry,
                )?))
            }
            (EntityKind::MenuEntry, OpKind::Delete) => {
                let deleted = self.delete_menu_entry(&op.entity_id).await?;
                Ok(deleted
                    .then(|| AppliedChange::deletion(ChangeEventKind::MenuDeleted, &op.entity_id)))
            }
        }
    }
}
