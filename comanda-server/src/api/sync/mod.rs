//! Sync API Module
//!
//! Ingestion point for batches of queued offline operations. Operations
//! are applied independently in batch order; one invalid operation never
//! blocks the rest.

mod handler;

use axum::{Router, routing::post};

use crate::core::ServerState;

/// Sync router
pub fn router() -> Router<ServerState> {
    Router::new().route("/api/sync/batch", post(handler::apply_batch))
}
