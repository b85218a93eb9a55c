//! Sync API Handlers

use axum::{Json, extract::State};
use shared::sync::{BatchRequest, BatchResponse};

use crate::core::ServerState;
use crate::utils::{AppError, AppResponse, AppResult, ok};

/// Apply a device batch and broadcast every committed change
///
/// Replay-safe: resubmitting an already-applied batch reports the same
/// operations as processed without changing ledger state.
pub async fn apply_batch(
    State(state): State<ServerState>,
    Json(req): Json<BatchRequest>,
) -> AppResult<Json<AppResponse<BatchResponse>>> {
    if req.tenant_id.is_empty() {
        return Err(AppError::Validation("tenant_id is required".into()));
    }

    let (response, changes) = state.ledger.apply_batch(&req).await?;

    tracing::info!(
        tenant_id = %req.tenant_id,
        processed = response.processed.len(),
        failed = response.failed.len(),
        "applied sync batch"
    );

    for change in changes {
        state
            .notifier
            .publish(&req.tenant_id, change.kind, &change.entity_id, change.data);
    }

    Ok(ok(response))
}
