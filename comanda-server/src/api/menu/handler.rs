//! Menu API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use shared::event::ChangeEventKind;
use shared::models::MenuEntry;
use shared::sync::MenuPatch;

use crate::api::TenantQuery;
use crate::core::ServerState;
use crate::utils::{AppError, AppResponse, AppResult, ok};

/// Full menu catalog for one tenant
pub async fn list(
    State(state): State<ServerState>,
    Query(query): Query<TenantQuery>,
) -> AppResult<Json<AppResponse<Vec<MenuEntry>>>> {
    let entries = state.ledger.list_menu(&query.tenant_id).await?;
    Ok(ok(entries))
}

/// Get one catalog entry
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<MenuEntry>>> {
    let entry = state
        .ledger
        .get_menu_entry(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Menu entry {id} not found")))?;
    Ok(ok(entry))
}

/// Insert or replace a catalog entry
pub async fn upsert(
    State(state): State<ServerState>,
    Json(entry): Json<MenuEntry>,
) -> AppResult<Json<AppResponse<MenuEntry>>> {
    if entry.id.is_empty() || entry.tenant_id.is_empty() {
        return Err(AppError::Validation("menu entry needs id and tenant_id".into()));
    }
    let entry = state.ledger.upsert_menu_entry(&entry).await?;
    state.publish(&entry.tenant_id, ChangeEventKind::MenuUpdated, &entry.id, Some(&entry));
    Ok(ok(entry))
}

/// Patch selected catalog fields
pub async fn update(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(patch): Json<MenuPatch>,
) -> AppResult<Json<AppResponse<MenuEntry>>> {
    let entry = state.ledger.patch_menu_entry(&id, &patch).await?;
    state.publish(&entry.tenant_id, ChangeEventKind::MenuUpdated, &entry.id, Some(&entry));
    Ok(ok(entry))
}

/// Remove a catalog entry; no-op if already gone
pub async fn remove(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<()>>> {
    let tenant = state.ledger.get_menu_entry(&id).await?.map(|e| e.tenant_id);
    let deleted = state.ledger.delete_menu_entry(&id).await?;
    if deleted {
        if let Some(tenant_id) = tenant {
            state
                .notifier
                .publish(&tenant_id, ChangeEventKind::MenuDeleted, &id, None);
        }
    }
    Ok(ok(()))
}
