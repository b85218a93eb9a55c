//! Order API Module
//!
//! Online devices talk to the ledger directly through these routes;
//! offline devices reach the same code paths later via the sync batch.

mod handler;

use axum::{
    Router,
    routing::{delete, get, patch, post},
};

use crate::core::ServerState;

/// Order router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::create))
        .route("/active", get(handler::list_active))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}", patch(handler::update))
        .route("/{id}", delete(handler::remove))
        .route("/{id}/items", patch(handler::update_item))
}
