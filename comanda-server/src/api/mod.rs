//! API route modules
//!
//! # Structure
//!
//! - [`health`] - health check
//! - [`orders`] - order creation, lifecycle and lookup
//! - [`menu`] - menu catalog management
//! - [`sync`] - batched offline-operation ingestion
//! - [`day`] - day close and closed-day summaries
//! - [`events`] - realtime change stream (WebSocket)

pub mod day;
pub mod events;
pub mod health;
pub mod menu;
pub mod orders;
pub mod sync;

use axum::Router;
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::ServerState;

/// Tenant selector shared by the list endpoints
#[derive(Debug, Deserialize)]
pub struct TenantQuery {
    pub tenant_id: String,
}

/// Compose the full application router
pub fn build_app() -> Router<ServerState> {
    Router::<ServerState>::new()
        .merge(health::router())
        .merge(orders::router())
        .merge(menu::router())
        .merge(sync::router())
        .merge(day::router())
        .merge(events::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// Re-export common types for handlers
pub use crate::utils::{AppResponse, AppResult};
