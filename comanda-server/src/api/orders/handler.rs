//! Order API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use shared::event::ChangeEventKind;
use shared::models::Order;
use shared::sync::{ItemPatch, OrderPatch};
use validator::Validate;

use crate::api::TenantQuery;
use crate::core::ServerState;
use crate::ledger::NewOrder;
use crate::utils::{AppError, AppResponse, AppResult, ok};

/// Create an order, assigning its daily ticket number
///
/// Idempotent on the device-generated order id: replaying the same id
/// returns the stored order and its original ticket number.
pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<NewOrder>,
) -> AppResult<Json<AppResponse<Order>>> {
    payload.validate()?;

    let (order, created) = state.ledger.create_or_get_order(payload).await?;
    if created {
        state.publish(&order.tenant_id, ChangeEventKind::OrderNew, &order.id, Some(&order));
    }
    Ok(ok(order))
}

/// List orders not yet in a terminal state
pub async fn list_active(
    State(state): State<ServerState>,
    Query(query): Query<TenantQuery>,
) -> AppResult<Json<AppResponse<Vec<Order>>>> {
    let orders = state.ledger.list_active_orders(&query.tenant_id).await?;
    Ok(ok(orders))
}

/// Get order by id
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<Order>>> {
    let order = state.ledger.get_order(&id).await?;
    Ok(ok(order))
}

/// Patch order fields (state, billing info, notes, table)
pub async fn update(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(patch): Json<OrderPatch>,
) -> AppResult<Json<AppResponse<Order>>> {
    if patch.is_empty() {
        return Err(AppError::Validation("empty order patch".into()));
    }
    let order = state.ledger.update_order(&id, &patch).await?;
    state.publish(&order.tenant_id, ChangeEventKind::OrderUpdated, &order.id, Some(&order));
    Ok(ok(order))
}

/// Advance one line item's preparation state
pub async fn update_item(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(patch): Json<ItemPatch>,
) -> AppResult<Json<AppResponse<Order>>> {
    let order = state
        .ledger
        .update_item_state(&id, &patch.item_id, patch.state)
        .await?;
    state.publish(&order.tenant_id, ChangeEventKind::OrderItemUpdated, &order.id, Some(&order));
    Ok(ok(order))
}

/// Delete an order (draft abandonment); no-op if already gone
pub async fn remove(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<()>>> {
    let tenant = state.ledger.load_order(&id).await?.map(|o| o.tenant_id);
    let deleted = state.ledger.delete_order(&id).await?;
    if deleted {
        if let Some(tenant_id) = tenant {
            state
                .notifier
                .publish(&tenant_id, ChangeEventKind::OrderDeleted, &id, None);
        }
    }
    Ok(ok(()))
}
