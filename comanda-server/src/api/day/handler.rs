//! Day Close API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use shared::event::ChangeEventKind;
use shared::models::ClosedDay;

use crate::api::TenantQuery;
use crate::core::ServerState;
use crate::utils::{AppError, AppResponse, AppResult, ok};

#[derive(Debug, Deserialize)]
pub struct CloseRequest {
    pub tenant_id: String,
}

/// Close the current business day
///
/// One transaction: snapshot, aggregate, force-settle whatever is still
/// open, persist the summary. Fails with a conflict if the day was
/// already closed.
pub async fn close(
    State(state): State<ServerState>,
    Json(req): Json<CloseRequest>,
) -> AppResult<Json<AppResponse<ClosedDay>>> {
    if req.tenant_id.is_empty() {
        return Err(AppError::Validation("tenant_id is required".into()));
    }

    let closed = state.ledger.close_day(&req.tenant_id).await?;
    state.publish(&req.tenant_id, ChangeEventKind::DayClosed, &closed.date, Some(&closed));

    tracing::info!(
        tenant_id = %req.tenant_id,
        date = %closed.date,
        orders = closed.total_orders,
        revenue_cents = closed.total_revenue_cents,
        "day closed"
    );
    Ok(ok(closed))
}

/// All closed-day summaries for a tenant, newest first
pub async fn list_closed(
    State(state): State<ServerState>,
    Query(query): Query<TenantQuery>,
) -> AppResult<Json<AppResponse<Vec<ClosedDay>>>> {
    let days = state.ledger.list_closed_days(&query.tenant_id).await?;
    Ok(ok(days))
}

/// One closed-day summary by date
pub async fn get_closed(
    State(state): State<ServerState>,
    Path(date): Path<String>,
    Query(query): Query<TenantQuery>,
) -> AppResult<Json<AppResponse<ClosedDay>>> {
    let day = state
        .ledger
        .get_closed_day(&query.tenant_id, &date)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Day {date} is not closed")))?;
    Ok(ok(day))
}
